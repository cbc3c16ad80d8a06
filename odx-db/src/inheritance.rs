//! Inheritance flattening: the effective view of a diagnostic layer.

use crate::database::Database;
use crate::dop::Dop;
use crate::error::LoadError;
use crate::handles::Handle;
use crate::layer::{DiagLayer, LayerKind};
use crate::service::DiagService;
use crate::table::Table;

/// The flattened, inheritance-merged view of one layer. Pure function of
/// the raw layer graph; computed once and cached on the database.
#[derive(Debug, Clone)]
pub struct EffectiveLayer {
    pub layer: Handle<DiagLayer>,
    pub short_name: String,
    pub kind: LayerKind,
    /// Short name to handle, in inheritance order. A locally declared
    /// item replaces an inherited one of the same name in place.
    pub services: Vec<(String, Handle<DiagService>)>,
    pub dops: Vec<(String, Handle<Dop>)>,
    pub tables: Vec<(String, Handle<Table>)>,
    /// Communication parameter values, overrides applied.
    pub comparams: Vec<(String, String)>,
}

impl EffectiveLayer {
    pub fn service(&self, name: &str) -> Option<Handle<DiagService>> {
        lookup(&self.services, name)
    }

    pub fn dop(&self, name: &str) -> Option<Handle<Dop>> {
        lookup(&self.dops, name)
    }

    pub fn table(&self, name: &str) -> Option<Handle<Table>> {
        lookup(&self.tables, name)
    }

    pub fn comparam_value(&self, name: &str) -> Option<&str> {
        self.comparams
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

fn lookup<T>(entries: &[(String, Handle<T>)], name: &str) -> Option<Handle<T>> {
    entries.iter().find(|(n, _)| n == name).map(|(_, h)| *h)
}

/// Replace an entry of the same name in place, keeping its position, or
/// append a new one.
fn upsert<V>(entries: &mut Vec<(String, V)>, name: String, value: V) {
    match entries.iter_mut().find(|(n, _)| *n == name) {
        Some(entry) => entry.1 = value,
        None => entries.push((name, value)),
    }
}

/// Flatten `handle` by walking its parent references.
///
/// `stack` carries the layers on the current traversal path; revisiting
/// one is a cycle and always fatal.
pub(crate) fn compute(
    db: &Database,
    handle: Handle<DiagLayer>,
    stack: &mut Vec<Handle<DiagLayer>>,
) -> Result<EffectiveLayer, LoadError> {
    let layer = &db.layers[handle.index()];
    if stack.contains(&handle) {
        return Err(LoadError::InheritanceCycle {
            layer: layer.short_name.clone(),
        });
    }
    stack.push(handle);

    // Parent contributions, ordered so that a higher-priority parent kind
    // overwrites a lower one and, among equal kinds, an earlier parent
    // reference wins over a later one.
    let mut contributions = Vec::new();
    for (decl_index, parent_ref) in layer.parent_refs.iter().enumerate() {
        let Ok(parent) = parent_ref.parent.get() else {
            log::warn!(
                "Skipping unresolved parent reference of layer '{}'",
                layer.short_name
            );
            continue;
        };
        let priority = db.layers[parent.index()].kind.inheritance_priority();
        let effective = compute(db, parent, stack)?;
        contributions.push((priority, decl_index, parent_ref, effective));
    }
    contributions.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut result = EffectiveLayer {
        layer: handle,
        short_name: layer.short_name.clone(),
        kind: layer.kind,
        services: Vec::new(),
        dops: Vec::new(),
        tables: Vec::new(),
        comparams: Vec::new(),
    };

    for (_, _, parent_ref, effective) in contributions {
        for (name, h) in effective.services {
            if !parent_ref.not_inherited_diag_comms.contains(&name) {
                upsert(&mut result.services, name, h);
            }
        }
        for (name, h) in effective.dops {
            if !parent_ref.not_inherited_dops.contains(&name) {
                upsert(&mut result.dops, name, h);
            }
        }
        for (name, h) in effective.tables {
            if !parent_ref.not_inherited_tables.contains(&name) {
                upsert(&mut result.tables, name, h);
            }
        }
        for (name, value) in effective.comparams {
            upsert(&mut result.comparams, name, value);
        }
    }

    // Local declarations override everything inherited.
    for &h in &layer.services {
        upsert(
            &mut result.services,
            db.services[h.index()].short_name.clone(),
            h,
        );
    }
    for link in &layer.service_refs {
        match link.get() {
            Ok(h) => upsert(
                &mut result.services,
                db.services[h.index()].short_name.clone(),
                h,
            ),
            Err(_) => log::warn!(
                "Skipping unresolved DIAG-COMM-REF of layer '{}'",
                layer.short_name
            ),
        }
    }
    for &h in &layer.dops {
        upsert(&mut result.dops, db.dops[h.index()].short_name.clone(), h);
    }
    for &h in &layer.tables {
        upsert(
            &mut result.tables,
            db.tables[h.index()].short_name.clone(),
            h,
        );
    }
    for comparam_ref in &layer.comparam_refs {
        let Ok(h) = comparam_ref.comparam.get() else {
            log::warn!(
                "Skipping unresolved COMPARAM-REF of layer '{}'",
                layer.short_name
            );
            continue;
        };
        let comparam = &db.comparams[h.index()];
        let value = comparam_ref
            .value
            .clone()
            .or_else(|| comparam.physical_default_value.clone());
        if let Some(value) = value {
            upsert(&mut result.comparams, comparam.short_name.clone(), value);
        }
    }

    stack.pop();
    Ok(result)
}
