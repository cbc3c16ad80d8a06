//! Raw ODX XML deserialization model.
//!
//! Serde-deserializable types matching the ODX 2.2.0 XML structure, using
//! quick-xml with `#[serde(rename = "TAG")]` for ODX element names. This is
//! the untyped boundary of the system: everything here is optional and
//! string-ish, exactly as it appears in the document. The `odx-db` crate
//! turns these trees into a strongly-typed, reference-resolved database.

use serde::Deserialize;

// --- Root ---

#[derive(Debug, Deserialize)]
#[serde(rename = "ODX")]
pub struct OdxDocument {
    #[serde(rename = "@MODEL-VERSION")]
    pub model_version: Option<String>,
    #[serde(rename = "DIAG-LAYER-CONTAINER")]
    pub diag_layer_container: Option<DiagLayerContainer>,
    #[serde(rename = "COMPARAM-SUBSET")]
    pub comparam_subset: Option<RawComparamSubset>,
}

// --- DiagLayerContainer ---

#[derive(Debug, Deserialize)]
pub struct DiagLayerContainer {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "PROTOCOLS")]
    pub protocols: Option<ProtocolsWrapper>,
    #[serde(rename = "FUNCTIONAL-GROUPS")]
    pub functional_groups: Option<FunctionalGroupsWrapper>,
    #[serde(rename = "BASE-VARIANTS")]
    pub base_variants: Option<BaseVariantsWrapper>,
    #[serde(rename = "ECU-VARIANTS")]
    pub ecu_variants: Option<EcuVariantsWrapper>,
    #[serde(rename = "ECU-SHARED-DATAS")]
    pub ecu_shared_datas: Option<EcuSharedDatasWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct ProtocolsWrapper {
    #[serde(rename = "PROTOCOL", default)]
    pub items: Vec<RawDiagLayer>,
}

#[derive(Debug, Deserialize)]
pub struct FunctionalGroupsWrapper {
    #[serde(rename = "FUNCTIONAL-GROUP", default)]
    pub items: Vec<RawDiagLayer>,
}

#[derive(Debug, Deserialize)]
pub struct BaseVariantsWrapper {
    #[serde(rename = "BASE-VARIANT", default)]
    pub items: Vec<RawDiagLayer>,
}

#[derive(Debug, Deserialize)]
pub struct EcuVariantsWrapper {
    #[serde(rename = "ECU-VARIANT", default)]
    pub items: Vec<RawDiagLayer>,
}

#[derive(Debug, Deserialize)]
pub struct EcuSharedDatasWrapper {
    #[serde(rename = "ECU-SHARED-DATA", default)]
    pub items: Vec<RawDiagLayer>,
}

// --- DiagLayer ---

#[derive(Debug, Deserialize)]
pub struct RawDiagLayer {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "DIAG-DATA-DICTIONARY-SPEC")]
    pub diag_data_dictionary_spec: Option<RawDataDictionary>,
    #[serde(rename = "DIAG-COMMS")]
    pub diag_comms: Option<DiagCommsWrapper>,
    #[serde(rename = "REQUESTS")]
    pub requests: Option<RequestsWrapper>,
    #[serde(rename = "POS-RESPONSES")]
    pub pos_responses: Option<PosResponsesWrapper>,
    #[serde(rename = "NEG-RESPONSES")]
    pub neg_responses: Option<NegResponsesWrapper>,
    #[serde(rename = "GLOBAL-NEG-RESPONSES")]
    pub global_neg_responses: Option<GlobalNegResponsesWrapper>,
    #[serde(rename = "PARENT-REFS")]
    pub parent_refs: Option<ParentRefsWrapper>,
    #[serde(rename = "COMPARAM-REFS")]
    pub comparam_refs: Option<ComparamRefsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct DiagCommsWrapper {
    #[serde(rename = "$value", default)]
    pub items: Vec<DiagCommEntry>,
}

/// DIAG-COMMS may contain services declared in place or references to
/// services declared elsewhere.
#[derive(Debug, Deserialize)]
pub enum DiagCommEntry {
    #[serde(rename = "DIAG-SERVICE")]
    DiagService(RawDiagService),
    #[serde(rename = "DIAG-COMM-REF")]
    DiagCommRef(RawRef),
}

#[derive(Debug, Deserialize)]
pub struct RequestsWrapper {
    #[serde(rename = "REQUEST", default)]
    pub items: Vec<RawRequest>,
}

#[derive(Debug, Deserialize)]
pub struct PosResponsesWrapper {
    #[serde(rename = "POS-RESPONSE", default)]
    pub items: Vec<RawResponse>,
}

#[derive(Debug, Deserialize)]
pub struct NegResponsesWrapper {
    #[serde(rename = "NEG-RESPONSE", default)]
    pub items: Vec<RawResponse>,
}

#[derive(Debug, Deserialize)]
pub struct GlobalNegResponsesWrapper {
    #[serde(rename = "GLOBAL-NEG-RESPONSE", default)]
    pub items: Vec<RawResponse>,
}

#[derive(Debug, Deserialize)]
pub struct ParentRefsWrapper {
    #[serde(rename = "PARENT-REF", default)]
    pub items: Vec<RawParentRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawParentRef {
    #[serde(rename = "@ID-REF")]
    pub id_ref: Option<String>,
    #[serde(rename = "@DOCREF")]
    pub docref: Option<String>,
    #[serde(rename = "@DOCTYPE")]
    pub doctype: Option<String>,
    #[serde(rename = "NOT-INHERITED-DIAG-COMMS")]
    pub not_inherited_diag_comms: Option<NotInheritedDiagCommsWrapper>,
    #[serde(rename = "NOT-INHERITED-DOPS")]
    pub not_inherited_dops: Option<NotInheritedDopsWrapper>,
    #[serde(rename = "NOT-INHERITED-TABLES")]
    pub not_inherited_tables: Option<NotInheritedTablesWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct NotInheritedDiagCommsWrapper {
    #[serde(rename = "NOT-INHERITED-DIAG-COMM", default)]
    pub items: Vec<NotInheritedSnRef>,
}

#[derive(Debug, Deserialize)]
pub struct NotInheritedDopsWrapper {
    #[serde(rename = "NOT-INHERITED-DOP", default)]
    pub items: Vec<NotInheritedSnRef>,
}

#[derive(Debug, Deserialize)]
pub struct NotInheritedTablesWrapper {
    #[serde(rename = "NOT-INHERITED-TABLE", default)]
    pub items: Vec<NotInheritedSnRef>,
}

#[derive(Debug, Deserialize)]
pub struct NotInheritedSnRef {
    #[serde(
        rename = "DIAG-COMM-SNREF",
        alias = "DOP-BASE-SNREF",
        alias = "TABLE-SNREF"
    )]
    pub snref: Option<RawSnRef>,
}

#[derive(Debug, Deserialize)]
pub struct ComparamRefsWrapper {
    #[serde(rename = "COMPARAM-REF", default)]
    pub items: Vec<RawComparamRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawComparamRef {
    #[serde(rename = "@ID-REF")]
    pub id_ref: Option<String>,
    #[serde(rename = "@DOCREF")]
    pub docref: Option<String>,
    #[serde(rename = "SIMPLE-VALUE")]
    pub simple_value: Option<String>,
}

// --- DiagService ---

#[derive(Debug, Deserialize)]
pub struct RawDiagService {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "@SEMANTIC")]
    pub semantic: Option<String>,
    #[serde(rename = "@ADDRESSING")]
    pub addressing: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "REQUEST-REF")]
    pub request_ref: Option<RawRef>,
    #[serde(rename = "POS-RESPONSE-REFS")]
    pub pos_response_refs: Option<PosResponseRefsWrapper>,
    #[serde(rename = "NEG-RESPONSE-REFS")]
    pub neg_response_refs: Option<NegResponseRefsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct PosResponseRefsWrapper {
    #[serde(rename = "POS-RESPONSE-REF", default)]
    pub items: Vec<RawRef>,
}

#[derive(Debug, Deserialize)]
pub struct NegResponseRefsWrapper {
    #[serde(rename = "NEG-RESPONSE-REF", default)]
    pub items: Vec<RawRef>,
}

// --- Request / Response ---

#[derive(Debug, Deserialize)]
pub struct RawRequest {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BYTE-SIZE")]
    pub byte_size: Option<u32>,
    #[serde(rename = "PARAMS")]
    pub params: Option<ParamsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct RawResponse {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BYTE-SIZE")]
    pub byte_size: Option<u32>,
    #[serde(rename = "PARAMS")]
    pub params: Option<ParamsWrapper>,
}

// --- Params ---

#[derive(Debug, Deserialize)]
pub struct ParamsWrapper {
    #[serde(rename = "PARAM", default)]
    pub items: Vec<RawParam>,
}

/// Generic parameter element. ODX distinguishes parameter kinds via the
/// `xsi:type` attribute, so all kind-specific fields are captured here and
/// dispatched on in `odx-db`.
#[derive(Debug, Deserialize)]
pub struct RawParam {
    #[serde(rename = "@xsi:type", alias = "@type")]
    pub xsi_type: Option<String>,
    #[serde(rename = "@SEMANTIC")]
    pub semantic: Option<String>,
    #[serde(rename = "@SYSPARAM")]
    pub sysparam: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "BYTE-POSITION")]
    pub byte_position: Option<u32>,
    #[serde(rename = "BIT-POSITION")]
    pub bit_position: Option<u32>,
    // VALUE / PHYS-CONST / SYSTEM / LENGTH-KEY
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "DOP-REF")]
    pub dop_ref: Option<RawRef>,
    #[serde(rename = "DOP-SNREF")]
    pub dop_snref: Option<RawSnRef>,
    #[serde(rename = "PHYSICAL-DEFAULT-VALUE")]
    pub physical_default_value: Option<String>,
    // CODED-CONST
    #[serde(rename = "CODED-VALUE")]
    pub coded_value: Option<String>,
    #[serde(rename = "DIAG-CODED-TYPE")]
    pub diag_coded_type: Option<RawDiagCodedType>,
    // NRC-CONST
    #[serde(rename = "CODED-VALUES")]
    pub coded_values: Option<CodedValuesWrapper>,
    // PHYS-CONST
    #[serde(rename = "PHYS-CONSTANT-VALUE")]
    pub phys_constant_value: Option<String>,
    // RESERVED
    #[serde(rename = "BIT-LENGTH")]
    pub bit_length: Option<u32>,
    // MATCHING-REQUEST-PARAM
    #[serde(rename = "REQUEST-BYTE-POS")]
    pub request_byte_pos: Option<u32>,
    #[serde(rename = "BYTE-LENGTH")]
    pub byte_length: Option<u32>,
    // TABLE-KEY
    #[serde(rename = "TABLE-REF")]
    pub table_ref: Option<RawRef>,
    #[serde(rename = "TABLE-SNREF")]
    pub table_snref: Option<RawSnRef>,
    // TABLE-STRUCT
    #[serde(rename = "TABLE-KEY-REF")]
    pub table_key_ref: Option<RawRef>,
    #[serde(rename = "TABLE-KEY-SNREF")]
    pub table_key_snref: Option<RawSnRef>,
}

#[derive(Debug, Deserialize)]
pub struct CodedValuesWrapper {
    #[serde(rename = "CODED-VALUE", default)]
    pub items: Vec<String>,
}

// --- DiagCodedType ---

#[derive(Debug, Deserialize)]
pub struct RawDiagCodedType {
    #[serde(rename = "@xsi:type", alias = "@type")]
    pub xsi_type: Option<String>,
    #[serde(rename = "@BASE-DATA-TYPE")]
    pub base_data_type: Option<String>,
    #[serde(rename = "@IS-HIGHLOW-BYTE-ORDER")]
    pub is_highlow_byte_order: Option<String>,
    #[serde(rename = "@TERMINATION")]
    pub termination: Option<String>,
    // Standard length
    #[serde(rename = "BIT-LENGTH")]
    pub bit_length: Option<u32>,
    #[serde(rename = "BIT-MASK")]
    pub bit_mask: Option<String>,
    // Min-max length
    #[serde(rename = "MIN-LENGTH")]
    pub min_length: Option<u32>,
    #[serde(rename = "MAX-LENGTH")]
    pub max_length: Option<u32>,
    // Param length
    #[serde(rename = "LENGTH-KEY-REF")]
    pub length_key_ref: Option<RawRef>,
}

// --- DiagDataDictionarySpec ---

#[derive(Debug, Deserialize)]
pub struct RawDataDictionary {
    #[serde(rename = "DATA-OBJECT-PROPS")]
    pub data_object_props: Option<DataObjectPropsWrapper>,
    #[serde(rename = "STRUCTURES")]
    pub structures: Option<StructuresWrapper>,
    #[serde(rename = "STATIC-FIELDS")]
    pub static_fields: Option<StaticFieldsWrapper>,
    #[serde(rename = "DYNAMIC-LENGTH-FIELDS")]
    pub dynamic_length_fields: Option<DynamicLengthFieldsWrapper>,
    #[serde(rename = "END-OF-PDU-FIELDS")]
    pub end_of_pdu_fields: Option<EndOfPduFieldsWrapper>,
    #[serde(rename = "MUXS")]
    pub muxs: Option<MuxsWrapper>,
    #[serde(rename = "TABLES")]
    pub tables: Option<TablesWrapper>,
    #[serde(rename = "UNIT-SPEC")]
    pub unit_spec: Option<RawUnitSpec>,
}

#[derive(Debug, Deserialize)]
pub struct DataObjectPropsWrapper {
    #[serde(rename = "DATA-OBJECT-PROP", default)]
    pub items: Vec<RawDataObjectProp>,
}

#[derive(Debug, Deserialize)]
pub struct StructuresWrapper {
    #[serde(rename = "STRUCTURE", default)]
    pub items: Vec<RawStructure>,
}

#[derive(Debug, Deserialize)]
pub struct StaticFieldsWrapper {
    #[serde(rename = "STATIC-FIELD", default)]
    pub items: Vec<RawStaticField>,
}

#[derive(Debug, Deserialize)]
pub struct DynamicLengthFieldsWrapper {
    #[serde(rename = "DYNAMIC-LENGTH-FIELD", default)]
    pub items: Vec<RawDynamicLengthField>,
}

#[derive(Debug, Deserialize)]
pub struct EndOfPduFieldsWrapper {
    #[serde(rename = "END-OF-PDU-FIELD", default)]
    pub items: Vec<RawEndOfPduField>,
}

#[derive(Debug, Deserialize)]
pub struct MuxsWrapper {
    #[serde(rename = "MUX", default)]
    pub items: Vec<RawMux>,
}

#[derive(Debug, Deserialize)]
pub struct TablesWrapper {
    #[serde(rename = "TABLE", default)]
    pub items: Vec<RawTable>,
}

// --- DataObjectProp ---

#[derive(Debug, Deserialize)]
pub struct RawDataObjectProp {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "COMPU-METHOD")]
    pub compu_method: Option<RawCompuMethod>,
    #[serde(rename = "DIAG-CODED-TYPE")]
    pub diag_coded_type: Option<RawDiagCodedType>,
    #[serde(rename = "PHYSICAL-TYPE")]
    pub physical_type: Option<RawPhysicalType>,
    #[serde(rename = "INTERNAL-CONSTR")]
    pub internal_constr: Option<RawInternalConstr>,
    #[serde(rename = "UNIT-REF")]
    pub unit_ref: Option<RawRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawPhysicalType {
    #[serde(rename = "@BASE-DATA-TYPE")]
    pub base_data_type: Option<String>,
    #[serde(rename = "@DISPLAY-RADIX")]
    pub display_radix: Option<String>,
    #[serde(rename = "PRECISION")]
    pub precision: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RawInternalConstr {
    #[serde(rename = "LOWER-LIMIT")]
    pub lower_limit: Option<RawLimit>,
    #[serde(rename = "UPPER-LIMIT")]
    pub upper_limit: Option<RawLimit>,
}

// --- CompuMethod ---

#[derive(Debug, Deserialize)]
pub struct RawCompuMethod {
    #[serde(rename = "CATEGORY")]
    pub category: Option<String>,
    #[serde(rename = "COMPU-INTERNAL-TO-PHYS")]
    pub compu_internal_to_phys: Option<RawCompuDirection>,
    #[serde(rename = "COMPU-PHYS-TO-INTERNAL")]
    pub compu_phys_to_internal: Option<RawCompuDirection>,
}

#[derive(Debug, Deserialize)]
pub struct RawCompuDirection {
    #[serde(rename = "COMPU-SCALES")]
    pub compu_scales: Option<CompuScalesWrapper>,
    #[serde(rename = "COMPU-DEFAULT-VALUE")]
    pub compu_default_value: Option<RawCompuValue>,
}

#[derive(Debug, Deserialize)]
pub struct CompuScalesWrapper {
    #[serde(rename = "COMPU-SCALE", default)]
    pub items: Vec<RawCompuScale>,
}

#[derive(Debug, Deserialize)]
pub struct RawCompuScale {
    #[serde(rename = "SHORT-LABEL")]
    pub short_label: Option<String>,
    #[serde(rename = "LOWER-LIMIT")]
    pub lower_limit: Option<RawLimit>,
    #[serde(rename = "UPPER-LIMIT")]
    pub upper_limit: Option<RawLimit>,
    #[serde(rename = "COMPU-INVERSE-VALUE")]
    pub compu_inverse_value: Option<RawCompuValue>,
    #[serde(rename = "COMPU-CONST")]
    pub compu_const: Option<RawCompuValue>,
    #[serde(rename = "COMPU-RATIONAL-COEFFS")]
    pub compu_rational_coeffs: Option<RawCompuRationalCoeffs>,
}

#[derive(Debug, Deserialize)]
pub struct RawCompuValue {
    #[serde(rename = "V")]
    pub v: Option<String>,
    #[serde(rename = "VT")]
    pub vt: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawCompuRationalCoeffs {
    #[serde(rename = "COMPU-NUMERATOR")]
    pub compu_numerator: Option<CompuCoeffsWrapper>,
    #[serde(rename = "COMPU-DENOMINATOR")]
    pub compu_denominator: Option<CompuCoeffsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct CompuCoeffsWrapper {
    #[serde(rename = "V", default)]
    pub items: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawLimit {
    #[serde(rename = "@INTERVAL-TYPE")]
    pub interval_type: Option<String>,
    #[serde(rename = "$text")]
    pub value: Option<String>,
}

// --- Structures / fields ---

#[derive(Debug, Deserialize)]
pub struct RawStructure {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BYTE-SIZE")]
    pub byte_size: Option<u32>,
    #[serde(rename = "PARAMS")]
    pub params: Option<ParamsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct RawStaticField {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BASIC-STRUCTURE-REF")]
    pub basic_structure_ref: Option<RawRef>,
    #[serde(rename = "FIXED-NUMBER-OF-ITEMS")]
    pub fixed_number_of_items: Option<u32>,
    #[serde(rename = "ITEM-BYTE-SIZE")]
    pub item_byte_size: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct RawDynamicLengthField {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BASIC-STRUCTURE-REF")]
    pub basic_structure_ref: Option<RawRef>,
    #[serde(rename = "OFFSET")]
    pub offset: Option<u32>,
    #[serde(rename = "DETERMINE-NUMBER-OF-ITEMS")]
    pub determine_number_of_items: Option<RawDetermineNumberOfItems>,
}

#[derive(Debug, Deserialize)]
pub struct RawDetermineNumberOfItems {
    #[serde(rename = "BYTE-POSITION")]
    pub byte_position: Option<u32>,
    #[serde(rename = "BIT-POSITION")]
    pub bit_position: Option<u32>,
    #[serde(rename = "DATA-OBJECT-PROP-REF")]
    pub dop_ref: Option<RawRef>,
}

#[derive(Debug, Deserialize)]
pub struct RawEndOfPduField {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BASIC-STRUCTURE-REF")]
    pub basic_structure_ref: Option<RawRef>,
    #[serde(rename = "MIN-NUMBER-OF-ITEMS")]
    pub min_number_of_items: Option<u32>,
    #[serde(rename = "MAX-NUMBER-OF-ITEMS")]
    pub max_number_of_items: Option<u32>,
}

// --- Mux ---

#[derive(Debug, Deserialize)]
pub struct RawMux {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "BYTE-POSITION")]
    pub byte_position: Option<u32>,
    #[serde(rename = "SWITCH-KEY")]
    pub switch_key: Option<RawSwitchKey>,
    #[serde(rename = "DEFAULT-CASE")]
    pub default_case: Option<RawMuxCase>,
    #[serde(rename = "CASES")]
    pub cases: Option<MuxCasesWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct RawSwitchKey {
    #[serde(rename = "BYTE-POSITION")]
    pub byte_position: Option<u32>,
    #[serde(rename = "BIT-POSITION")]
    pub bit_position: Option<u32>,
    #[serde(rename = "DATA-OBJECT-PROP-REF")]
    pub dop_ref: Option<RawRef>,
}

#[derive(Debug, Deserialize)]
pub struct MuxCasesWrapper {
    #[serde(rename = "CASE", default)]
    pub items: Vec<RawMuxCase>,
}

#[derive(Debug, Deserialize)]
pub struct RawMuxCase {
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LOWER-LIMIT")]
    pub lower_limit: Option<RawLimit>,
    #[serde(rename = "UPPER-LIMIT")]
    pub upper_limit: Option<RawLimit>,
    #[serde(rename = "STRUCTURE-REF")]
    pub structure_ref: Option<RawRef>,
}

// --- Table ---

#[derive(Debug, Deserialize)]
pub struct RawTable {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "LONG-NAME")]
    pub long_name: Option<String>,
    #[serde(rename = "KEY-DOP-REF")]
    pub key_dop_ref: Option<RawRef>,
    #[serde(rename = "TABLE-ROW", default)]
    pub table_rows: Vec<RawTableRow>,
}

#[derive(Debug, Deserialize)]
pub struct RawTableRow {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "KEY")]
    pub key: Option<String>,
    #[serde(rename = "STRUCTURE-REF")]
    pub structure_ref: Option<RawRef>,
    #[serde(rename = "DATA-OBJECT-PROP-REF")]
    pub dop_ref: Option<RawRef>,
}

// --- UnitSpec ---

#[derive(Debug, Deserialize)]
pub struct RawUnitSpec {
    #[serde(rename = "UNITS")]
    pub units: Option<UnitsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct UnitsWrapper {
    #[serde(rename = "UNIT", default)]
    pub items: Vec<RawUnit>,
}

#[derive(Debug, Deserialize)]
pub struct RawUnit {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "DISPLAY-NAME")]
    pub display_name: Option<String>,
    #[serde(rename = "FACTOR-SI-TO-UNIT")]
    pub factor_si_to_unit: Option<f64>,
    #[serde(rename = "OFFSET-SI-TO-UNIT")]
    pub offset_si_to_unit: Option<f64>,
}

// --- ComparamSubset ---

#[derive(Debug, Deserialize)]
pub struct RawComparamSubset {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "@CATEGORY")]
    pub category: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "COMPARAMS")]
    pub comparams: Option<ComparamsWrapper>,
}

#[derive(Debug, Deserialize)]
pub struct ComparamsWrapper {
    #[serde(rename = "COMPARAM", default)]
    pub items: Vec<RawComparam>,
}

#[derive(Debug, Deserialize)]
pub struct RawComparam {
    #[serde(rename = "@ID")]
    pub id: Option<String>,
    #[serde(rename = "@PARAM-CLASS")]
    pub param_class: Option<String>,
    #[serde(rename = "SHORT-NAME")]
    pub short_name: Option<String>,
    #[serde(rename = "PHYSICAL-DEFAULT-VALUE")]
    pub physical_default_value: Option<String>,
}

// --- Common types ---

#[derive(Debug, Deserialize)]
pub struct RawRef {
    #[serde(rename = "@ID-REF")]
    pub id_ref: Option<String>,
    #[serde(rename = "@DOCREF")]
    pub docref: Option<String>,
    #[serde(rename = "@DOCTYPE")]
    pub doctype: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct RawSnRef {
    #[serde(rename = "@SHORT-NAME")]
    pub short_name: Option<String>,
}
