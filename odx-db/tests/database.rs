//! End-to-end tests against in-memory ODX documents: loading, inheritance
//! flattening, message identification and the encode/decode round trips.

use odx_db::{
    CodecError, Database, DispatchError, LoadError, LoadOptions, MessageRole, OdxValue, ParamValue,
};
use pretty_assertions::assert_eq;

/// A UDS-flavored base variant with one ECU variant on top. Services:
/// session control (0x10), a table-driven data read (0x22), a length-key
/// write (0x2e), a mux status report (0x31) and, on the ECU variant only,
/// a reset (0x11).
const ENGINE_XML: &str = r#"<ODX MODEL-VERSION="2.2.0" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<DIAG-LAYER-CONTAINER ID="dlc.engine">
<SHORT-NAME>EngineContainer</SHORT-NAME>
<BASE-VARIANTS>
<BASE-VARIANT ID="bv.engine">
<SHORT-NAME>Engine</SHORT-NAME>
<COMPARAM-REFS>
<COMPARAM-REF ID-REF="cp.timeout"><SIMPLE-VALUE>500</SIMPLE-VALUE></COMPARAM-REF>
</COMPARAM-REFS>
<DIAG-DATA-DICTIONARY-SPEC>
<DATA-OBJECT-PROPS>
<DATA-OBJECT-PROP ID="dop.u8">
  <SHORT-NAME>UInt8</SHORT-NAME>
  <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
  <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
  <PHYSICAL-TYPE BASE-DATA-TYPE="A_UINT32"/>
</DATA-OBJECT-PROP>
<DATA-OBJECT-PROP ID="dop.did">
  <SHORT-NAME>DataId</SHORT-NAME>
  <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
  <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>16</BIT-LENGTH></DIAG-CODED-TYPE>
  <PHYSICAL-TYPE BASE-DATA-TYPE="A_UINT32"/>
</DATA-OBJECT-PROP>
<DATA-OBJECT-PROP ID="dop.temp">
  <SHORT-NAME>Temperature</SHORT-NAME>
  <COMPU-METHOD>
    <CATEGORY>LINEAR</CATEGORY>
    <COMPU-INTERNAL-TO-PHYS><COMPU-SCALES><COMPU-SCALE>
      <LOWER-LIMIT>0</LOWER-LIMIT>
      <UPPER-LIMIT>255</UPPER-LIMIT>
      <COMPU-RATIONAL-COEFFS>
        <COMPU-NUMERATOR><V>-40</V><V>1</V></COMPU-NUMERATOR>
        <COMPU-DENOMINATOR><V>1</V></COMPU-DENOMINATOR>
      </COMPU-RATIONAL-COEFFS>
    </COMPU-SCALE></COMPU-SCALES></COMPU-INTERNAL-TO-PHYS>
  </COMPU-METHOD>
  <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
  <PHYSICAL-TYPE BASE-DATA-TYPE="A_INT32"/>
</DATA-OBJECT-PROP>
<DATA-OBJECT-PROP ID="dop.ascii3">
  <SHORT-NAME>Ascii3</SHORT-NAME>
  <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
  <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_ASCIISTRING"><BIT-LENGTH>24</BIT-LENGTH></DIAG-CODED-TYPE>
  <PHYSICAL-TYPE BASE-DATA-TYPE="A_ASCIISTRING"/>
</DATA-OBJECT-PROP>
<DATA-OBJECT-PROP ID="dop.blob">
  <SHORT-NAME>Blob</SHORT-NAME>
  <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
  <DIAG-CODED-TYPE xsi:type="PARAM-LENGTH-INFO-TYPE" BASE-DATA-TYPE="A_BYTEFIELD"><LENGTH-KEY-REF ID-REF="pk.size"/></DIAG-CODED-TYPE>
  <PHYSICAL-TYPE BASE-DATA-TYPE="A_BYTEFIELD"/>
</DATA-OBJECT-PROP>
</DATA-OBJECT-PROPS>
<STRUCTURES>
<STRUCTURE ID="struct.record">
  <SHORT-NAME>Record</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="VALUE"><SHORT-NAME>Data</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION><DOP-REF ID-REF="dop.ascii3"/></PARAM>
  </PARAMS>
</STRUCTURE>
<STRUCTURE ID="struct.slow">
  <SHORT-NAME>SlowReport</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="VALUE"><SHORT-NAME>Speed</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION><DOP-REF ID-REF="dop.u8"/></PARAM>
  </PARAMS>
</STRUCTURE>
</STRUCTURES>
<MUXS>
<MUX ID="mux.status">
  <SHORT-NAME>Status</SHORT-NAME>
  <BYTE-POSITION>1</BYTE-POSITION>
  <SWITCH-KEY>
    <BYTE-POSITION>0</BYTE-POSITION>
    <DATA-OBJECT-PROP-REF ID-REF="dop.u8"/>
  </SWITCH-KEY>
  <DEFAULT-CASE><SHORT-NAME>Unknown</SHORT-NAME></DEFAULT-CASE>
  <CASES>
    <CASE>
      <SHORT-NAME>Slow</SHORT-NAME>
      <LOWER-LIMIT>1</LOWER-LIMIT>
      <UPPER-LIMIT>1</UPPER-LIMIT>
      <STRUCTURE-REF ID-REF="struct.slow"/>
    </CASE>
  </CASES>
</MUX>
</MUXS>
<TABLES>
<TABLE ID="tab.did">
  <SHORT-NAME>DidTable</SHORT-NAME>
  <KEY-DOP-REF ID-REF="dop.did"/>
  <TABLE-ROW ID="row.vin">
    <SHORT-NAME>Vin</SHORT-NAME>
    <KEY>144</KEY>
    <STRUCTURE-REF ID-REF="struct.record"/>
  </TABLE-ROW>
  <TABLE-ROW ID="row.hwrev">
    <SHORT-NAME>HardwareRev</SHORT-NAME>
    <KEY>145</KEY>
    <STRUCTURE-REF ID-REF="struct.record"/>
  </TABLE-ROW>
</TABLE>
</TABLES>
</DIAG-DATA-DICTIONARY-SPEC>
<DIAG-COMMS>
<DIAG-SERVICE ID="svc.session" SEMANTIC="SESSION">
  <SHORT-NAME>StartSession</SHORT-NAME>
  <REQUEST-REF ID-REF="rq.session"/>
  <POS-RESPONSE-REFS><POS-RESPONSE-REF ID-REF="rs.session"/></POS-RESPONSE-REFS>
  <NEG-RESPONSE-REFS><NEG-RESPONSE-REF ID-REF="nr.general"/></NEG-RESPONSE-REFS>
</DIAG-SERVICE>
<DIAG-SERVICE ID="svc.read">
  <SHORT-NAME>ReadData</SHORT-NAME>
  <REQUEST-REF ID-REF="rq.read"/>
  <NEG-RESPONSE-REFS><NEG-RESPONSE-REF ID-REF="nr.general"/></NEG-RESPONSE-REFS>
</DIAG-SERVICE>
<DIAG-SERVICE ID="svc.write">
  <SHORT-NAME>WriteData</SHORT-NAME>
  <REQUEST-REF ID-REF="rq.write"/>
</DIAG-SERVICE>
<DIAG-SERVICE ID="svc.report">
  <SHORT-NAME>ReportStatus</SHORT-NAME>
  <REQUEST-REF ID-REF="rq.report"/>
</DIAG-SERVICE>
</DIAG-COMMS>
<REQUESTS>
<REQUEST ID="rq.session">
  <SHORT-NAME>RQ_StartSession</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>16</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>Session</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION><DOP-REF ID-REF="dop.u8"/></PARAM>
  </PARAMS>
</REQUEST>
<REQUEST ID="rq.read">
  <SHORT-NAME>RQ_ReadData</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>34</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="TABLE-KEY" ID="pk.did">
      <SHORT-NAME>Did</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION>
      <TABLE-REF ID-REF="tab.did"/>
    </PARAM>
    <PARAM xsi:type="TABLE-STRUCT">
      <SHORT-NAME>Payload</SHORT-NAME><BYTE-POSITION>3</BYTE-POSITION>
      <TABLE-KEY-SNREF SHORT-NAME="Did"/>
    </PARAM>
  </PARAMS>
</REQUEST>
<REQUEST ID="rq.write">
  <SHORT-NAME>RQ_WriteData</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>46</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="LENGTH-KEY" ID="pk.size">
      <SHORT-NAME>Size</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION>
      <DOP-REF ID-REF="dop.u8"/>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>Data</SHORT-NAME><BYTE-POSITION>2</BYTE-POSITION><DOP-REF ID-REF="dop.blob"/></PARAM>
  </PARAMS>
</REQUEST>
<REQUEST ID="rq.report">
  <SHORT-NAME>RQ_ReportStatus</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>49</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>Report</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION><DOP-REF ID-REF="mux.status"/></PARAM>
  </PARAMS>
</REQUEST>
</REQUESTS>
<POS-RESPONSES>
<POS-RESPONSE ID="rs.session">
  <SHORT-NAME>RS_StartSession</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>80</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="MATCHING-REQUEST-PARAM">
      <SHORT-NAME>Session</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION>
      <REQUEST-BYTE-POS>1</REQUEST-BYTE-POS>
      <BYTE-LENGTH>1</BYTE-LENGTH>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>CoolantTemp</SHORT-NAME><BYTE-POSITION>2</BYTE-POSITION><DOP-REF ID-REF="dop.temp"/></PARAM>
  </PARAMS>
</POS-RESPONSE>
</POS-RESPONSES>
<NEG-RESPONSES>
<NEG-RESPONSE ID="nr.general">
  <SHORT-NAME>NR_General</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>127</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>RequestSid</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION><DOP-REF ID-REF="dop.u8"/></PARAM>
    <PARAM xsi:type="NRC-CONST">
      <SHORT-NAME>Nrc</SHORT-NAME><BYTE-POSITION>2</BYTE-POSITION>
      <CODED-VALUES><CODED-VALUE>18</CODED-VALUE><CODED-VALUE>34</CODED-VALUE></CODED-VALUES>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
  </PARAMS>
</NEG-RESPONSE>
</NEG-RESPONSES>
</BASE-VARIANT>
</BASE-VARIANTS>
<ECU-VARIANTS>
<ECU-VARIANT ID="ev.engine">
<SHORT-NAME>EngineEcu</SHORT-NAME>
<DIAG-COMMS>
<DIAG-SERVICE ID="svc.reset">
  <SHORT-NAME>EcuReset</SHORT-NAME>
  <REQUEST-REF ID-REF="rq.reset"/>
</DIAG-SERVICE>
</DIAG-COMMS>
<REQUESTS>
<REQUEST ID="rq.reset">
  <SHORT-NAME>RQ_EcuReset</SHORT-NAME>
  <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>17</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="VALUE"><SHORT-NAME>ResetMode</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION><DOP-REF ID-REF="dop.u8"/></PARAM>
  </PARAMS>
</REQUEST>
</REQUESTS>
<PARENT-REFS>
<PARENT-REF xsi:type="BASE-VARIANT-REF" ID-REF="bv.engine">
  <NOT-INHERITED-DIAG-COMMS>
    <NOT-INHERITED-DIAG-COMM><DIAG-COMM-SNREF SHORT-NAME="WriteData"/></NOT-INHERITED-DIAG-COMM>
  </NOT-INHERITED-DIAG-COMMS>
</PARENT-REF>
</PARENT-REFS>
</ECU-VARIANT>
</ECU-VARIANTS>
</DIAG-LAYER-CONTAINER>
</ODX>"#;

const COMPARAM_XML: &str = r#"<ODX MODEL-VERSION="2.2.0">
<COMPARAM-SUBSET ID="cps.iso" CATEGORY="ISO_15765_3">
<SHORT-NAME>ISO_15765_3</SHORT-NAME>
<COMPARAMS>
<COMPARAM ID="cp.timeout" PARAM-CLASS="TIMING">
  <SHORT-NAME>CP_RequestTimeout</SHORT-NAME>
  <PHYSICAL-DEFAULT-VALUE>1000</PHYSICAL-DEFAULT-VALUE>
</COMPARAM>
<COMPARAM ID="cp.retries" PARAM-CLASS="COM">
  <SHORT-NAME>CP_Retries</SHORT-NAME>
  <PHYSICAL-DEFAULT-VALUE>3</PHYSICAL-DEFAULT-VALUE>
</COMPARAM>
</COMPARAMS>
</COMPARAM-SUBSET>
</ODX>"#;

fn engine_db() -> Database {
    Database::from_xml(&[ENGINE_XML, COMPARAM_XML], LoadOptions::default())
        .expect("fixture must load")
}

fn atomic(v: i64) -> ParamValue {
    ParamValue::Atomic(OdxValue::Integer(v))
}

#[test]
fn loads_layers_and_flattened_services() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let names: Vec<&str> = effective.services.iter().map(|(n, _)| n.as_str()).collect();
    assert_eq!(
        names,
        vec!["StartSession", "ReadData", "WriteData", "ReportStatus"]
    );
    assert!(effective.dop("Temperature").is_some());
    assert!(effective.table("DidTable").is_some());
}

#[test]
fn ecu_variant_inherits_except_not_inherited() {
    let db = engine_db();
    let ecu = db.layer_by_name("EngineEcu").unwrap();
    let effective = db.effective_layer(ecu).unwrap();

    assert!(effective.service("StartSession").is_some());
    assert!(effective.service("EcuReset").is_some());
    // filtered out by NOT-INHERITED-DIAG-COMMS
    assert!(effective.service("WriteData").is_none());
    // inherited DOPs are unaffected
    assert!(effective.dop("Blob").is_some());
}

#[test]
fn comparam_override_and_default() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // SIMPLE-VALUE overrides the subset default
    assert_eq!(effective.comparam_value("CP_RequestTimeout"), Some("500"));
    assert_eq!(effective.comparam_value("CP_Retries"), None);

    // the override is inherited by the ECU variant
    let ecu = db.layer_by_name("EngineEcu").unwrap();
    let effective = db.effective_layer(ecu).unwrap();
    assert_eq!(effective.comparam_value("CP_RequestTimeout"), Some("500"));
}

#[test]
fn start_session_round_trip() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let values = ParamValue::Struct(vec![("Session".into(), atomic(3))]);
    let coded = db
        .encode_request(&effective, "StartSession", &values)
        .unwrap();
    assert_eq!(coded, vec![0x10, 0x03]);

    let decoded = db.decode_message(&effective, &coded, None).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].service_name, "StartSession");
    assert_eq!(decoded[0].role, MessageRole::Request);
    assert_eq!(
        decoded[0].values,
        ParamValue::Struct(vec![
            ("SID".into(), atomic(16)),
            ("Session".into(), atomic(3)),
        ])
    );
}

#[test]
fn identify_finds_the_matching_service() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let candidates = db.identify(&effective, &[0x10, 0x01]).unwrap();
    assert_eq!(candidates.len(), 1);
    assert_eq!(db.service(candidates[0]).short_name, "StartSession");
}

#[test]
fn unknown_sid_yields_no_matching_service() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // 0x11 only exists on the ECU variant, not on the base variant
    assert!(matches!(
        db.identify(&effective, &[0x11, 0x00]),
        Err(DispatchError::NoMatchingService)
    ));
    assert!(matches!(
        db.decode_message(&effective, &[0x11, 0x00], None),
        Err(DispatchError::NoMatchingService)
    ));

    let ecu = db.layer_by_name("EngineEcu").unwrap();
    let effective = db.effective_layer(ecu).unwrap();
    let candidates = db.identify(&effective, &[0x11, 0x00]).unwrap();
    assert_eq!(db.service(candidates[0]).short_name, "EcuReset");
}

#[test]
fn linear_compu_converts_and_bounds() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // coolant temperature is coded as an offset-40 byte; the session echo
    // is copied out of the supplied request
    let decoded = db
        .decode_message(&effective, &[0x50, 0x03, 0xff], Some(&[0x10, 0x03]))
        .unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].role, MessageRole::PosResponse);
    assert_eq!(
        decoded[0].values,
        ParamValue::Struct(vec![
            ("SID".into(), atomic(80)),
            (
                "Session".into(),
                ParamValue::Atomic(OdxValue::Bytes(vec![0x03])),
            ),
            ("CoolantTemp".into(), atomic(215)),
        ])
    );
}

#[test]
fn response_decode_requires_the_triggering_request() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // without request bytes the copied range cannot be reconstructed
    let err = db
        .decode_message(&effective, &[0x50, 0x03, 0x00], None)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Codec(CodecError::MissingMatchingRequest)
    ));

    // identification only checks the constant pattern and still succeeds
    let candidates = db.identify(&effective, &[0x50, 0x03, 0x00]).unwrap();
    assert_eq!(db.service(candidates[0]).short_name, "StartSession");
}

#[test]
fn matching_request_param_copies_request_bytes() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();
    let service = effective.service("StartSession").unwrap();
    let response = db.service(service).pos_responses[0].get().unwrap();

    let values = ParamValue::Struct(vec![("CoolantTemp".into(), atomic(-40))]);
    let coded = db
        .message(response)
        .encode(&db.scope(&effective), &values, Some(&[0x10, 0x03]))
        .unwrap();
    assert_eq!(coded, vec![0x50, 0x03, 0x00]);

    // without the triggering request the response cannot be encoded
    let err = db
        .message(response)
        .encode(&db.scope(&effective), &values, None)
        .unwrap_err();
    assert!(matches!(err, CodecError::MissingMatchingRequest));
}

#[test]
fn encode_rejects_a_value_conflicting_with_a_constant() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let values = ParamValue::Struct(vec![
        ("SID".into(), atomic(0x11)),
        ("Session".into(), atomic(3)),
    ]);
    let err = db
        .encode_request(&effective, "StartSession", &values)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Codec(CodecError::ValueOutOfRange { .. })
    ));
}

#[test]
fn encode_rejects_out_of_domain_physical_value() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();
    let service = effective.service("StartSession").unwrap();
    let response = db.service(service).pos_responses[0].get().unwrap();

    // 216 would require internal 256, beyond the 8-bit domain
    let values = ParamValue::Struct(vec![("CoolantTemp".into(), atomic(216))]);
    let err = db
        .message(response)
        .encode(&db.scope(&effective), &values, Some(&[0x10, 0x03]))
        .unwrap_err();
    assert!(matches!(err, CodecError::Conversion(_)));
}

#[test]
fn phys_const_through_a_dop_snref_compares_typed() {
    let xml = r#"<ODX xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <DIAG-LAYER-CONTAINER ID="dlc.ping"><SHORT-NAME>Ping</SHORT-NAME>
    <BASE-VARIANTS>
    <BASE-VARIANT ID="bv.ping"><SHORT-NAME>Pinger</SHORT-NAME>
    <DIAG-DATA-DICTIONARY-SPEC>
    <DATA-OBJECT-PROPS>
    <DATA-OBJECT-PROP ID="dop.mode"><SHORT-NAME>Mode</SHORT-NAME>
      <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
      <PHYSICAL-TYPE BASE-DATA-TYPE="A_UINT32"/>
    </DATA-OBJECT-PROP>
    </DATA-OBJECT-PROPS>
    </DIAG-DATA-DICTIONARY-SPEC>
    <DIAG-COMMS>
    <DIAG-SERVICE ID="svc.ping"><SHORT-NAME>TesterPresent</SHORT-NAME><REQUEST-REF ID-REF="rq.ping"/></DIAG-SERVICE>
    </DIAG-COMMS>
    <REQUESTS>
    <REQUEST ID="rq.ping"><SHORT-NAME>RQ_TesterPresent</SHORT-NAME>
    <PARAMS>
    <PARAM xsi:type="CODED-CONST" SEMANTIC="SERVICE-ID">
      <SHORT-NAME>SID</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION>
      <CODED-VALUE>62</CODED-VALUE>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
    </PARAM>
    <PARAM xsi:type="PHYS-CONST">
      <SHORT-NAME>ZeroSubFunction</SHORT-NAME><BYTE-POSITION>1</BYTE-POSITION>
      <PHYS-CONSTANT-VALUE>0</PHYS-CONSTANT-VALUE>
      <DOP-SNREF SHORT-NAME="Mode"/>
    </PARAM>
    </PARAMS>
    </REQUEST>
    </REQUESTS>
    </BASE-VARIANT>
    </BASE-VARIANTS>
    </DIAG-LAYER-CONTAINER></ODX>"#;
    let db = Database::from_xml(&[xml], LoadOptions::default()).unwrap();
    let layer = db.layer_by_name("Pinger").unwrap();
    let effective = db.effective_layer(layer).unwrap();

    // the textual constant is retyped against the short-name resolved DOP
    let decoded = db.decode_message(&effective, &[0x3e, 0x00], None).unwrap();
    assert_eq!(
        decoded[0].values,
        ParamValue::Struct(vec![
            ("SID".into(), atomic(62)),
            ("ZeroSubFunction".into(), atomic(0)),
        ])
    );
    assert!(matches!(
        db.decode_message(&effective, &[0x3e, 0x01], None),
        Err(DispatchError::NoMatchingService)
    ));

    let coded = db
        .encode_request(&effective, "TesterPresent", &ParamValue::Struct(Vec::new()))
        .unwrap();
    assert_eq!(coded, vec![0x3e, 0x00]);
}

#[test]
fn expected_request_filters_response_candidates() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let decoded = db
        .decode_message(&effective, &[0x50, 0x03, 0x00], Some(&[0x10, 0x03]))
        .unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(decoded[0].message_name, "RS_StartSession");

    // a request of a different service matches nothing
    assert!(matches!(
        db.decode_message(&effective, &[0x50, 0x03, 0x00], Some(&[0x2e, 0x01, 0xaa])),
        Err(DispatchError::NoMatchingService)
    ));
}

#[test]
fn negative_response_is_shared_between_services() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // NR_General is referenced by StartSession and ReadData; ambiguity is
    // preserved as one result per owning service
    let decoded = db
        .decode_message(&effective, &[0x7f, 0x10, 0x12], None)
        .unwrap();
    assert_eq!(decoded.len(), 2);
    assert!(decoded.iter().all(|d| d.message_name == "NR_General"));
    assert!(decoded.iter().all(|d| d.role == MessageRole::NegResponse));

    // a response code outside CODED-VALUES matches nothing
    assert!(
        db.decode_message(&effective, &[0x7f, 0x10, 0x99], None)
            .is_err()
    );
}

#[test]
fn table_key_selects_row_and_structure() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let coded = [0x22, 0x00, 0x90, b'A', b'B', b'C'];
    let decoded = db.decode_message(&effective, &coded, None).unwrap();
    assert_eq!(decoded.len(), 1);
    let expected = ParamValue::Struct(vec![
        ("SID".into(), atomic(34)),
        (
            "Did".into(),
            ParamValue::Atomic(OdxValue::String("Vin".into())),
        ),
        (
            "Payload".into(),
            ParamValue::Selected {
                name: "Vin".into(),
                value: Box::new(ParamValue::Struct(vec![(
                    "Data".into(),
                    ParamValue::Atomic(OdxValue::String("ABC".into())),
                )])),
            },
        ),
    ]);
    assert_eq!(decoded[0].values, expected);

    // the row chosen through the TABLE-STRUCT value also selects the key
    let values = ParamValue::Struct(vec![(
        "Payload".into(),
        ParamValue::Selected {
            name: "HardwareRev".into(),
            value: Box::new(ParamValue::Struct(vec![(
                "Data".into(),
                ParamValue::Atomic(OdxValue::String("X21".into())),
            )])),
        },
    )]);
    let coded = db.encode_request(&effective, "ReadData", &values).unwrap();
    assert_eq!(coded, vec![0x22, 0x00, 0x91, b'X', b'2', b'1']);
}

#[test]
fn unknown_table_key_is_rejected() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // key 0x0092 has no table row
    assert!(
        db.decode_message(&effective, &[0x22, 0x00, 0x92, b'A', b'B', b'C'], None)
            .is_err()
    );

    let values = ParamValue::Struct(vec![(
        "Payload".into(),
        ParamValue::Selected {
            name: "NoSuchRow".into(),
            value: Box::new(ParamValue::Struct(Vec::new())),
        },
    )]);
    let err = db
        .encode_request(&effective, "ReadData", &values)
        .unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Codec(CodecError::InvalidTableKey { .. })
    ));
}

#[test]
fn length_key_is_back_patched_from_payload() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    // no explicit Size: the blob length determines it after the fact
    let values = ParamValue::Struct(vec![(
        "Data".into(),
        ParamValue::Atomic(OdxValue::Bytes(vec![0xde, 0xad, 0xbe])),
    )]);
    let coded = db.encode_request(&effective, "WriteData", &values).unwrap();
    assert_eq!(coded, vec![0x2e, 24, 0xde, 0xad, 0xbe]);

    let decoded = db.decode_message(&effective, &coded, None).unwrap();
    assert_eq!(decoded.len(), 1);
    assert_eq!(
        decoded[0].values,
        ParamValue::Struct(vec![
            ("SID".into(), atomic(46)),
            ("Size".into(), atomic(24)),
            (
                "Data".into(),
                ParamValue::Atomic(OdxValue::Bytes(vec![0xde, 0xad, 0xbe])),
            ),
        ])
    );
}

#[test]
fn mux_selects_case_by_switch_key() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    let decoded = db.decode_message(&effective, &[0x31, 0x01, 0x07], None).unwrap();
    assert_eq!(
        decoded[0].values,
        ParamValue::Struct(vec![
            ("SID".into(), atomic(49)),
            (
                "Report".into(),
                ParamValue::Selected {
                    name: "Slow".into(),
                    value: Box::new(ParamValue::Struct(vec![("Speed".into(), atomic(7))])),
                },
            ),
        ])
    );

    // a key outside every case falls back to the default case
    let decoded = db.decode_message(&effective, &[0x31, 0x09], None).unwrap();
    assert_eq!(
        decoded[0].values.field("Report"),
        Some(&ParamValue::Selected {
            name: "Unknown".into(),
            value: Box::new(ParamValue::Struct(Vec::new())),
        })
    );

    // encoding writes the case's lower limit as the switch key
    let values = ParamValue::Struct(vec![(
        "Report".into(),
        ParamValue::Selected {
            name: "Slow".into(),
            value: Box::new(ParamValue::Struct(vec![("Speed".into(), atomic(9))])),
        },
    )]);
    let coded = db
        .encode_request(&effective, "ReportStatus", &values)
        .unwrap();
    assert_eq!(coded, vec![0x31, 0x01, 0x09]);
}

#[test]
fn trailing_bytes_fail_the_decode() {
    let db = engine_db();
    let engine = db.layer_by_name("Engine").unwrap();
    let effective = db.effective_layer(engine).unwrap();

    assert!(matches!(
        db.decode_message(&effective, &[0x10, 0x03, 0xaa], None),
        Err(DispatchError::NoMatchingService)
    ));
}

#[test]
fn inheritance_cycle_is_fatal() {
    let xml = r#"<ODX>
    <DIAG-LAYER-CONTAINER ID="dlc.cycle"><SHORT-NAME>Cycle</SHORT-NAME>
    <ECU-VARIANTS>
    <ECU-VARIANT ID="ev.a"><SHORT-NAME>VariantA</SHORT-NAME>
      <PARENT-REFS><PARENT-REF ID-REF="ev.b"/></PARENT-REFS>
    </ECU-VARIANT>
    <ECU-VARIANT ID="ev.b"><SHORT-NAME>VariantB</SHORT-NAME>
      <PARENT-REFS><PARENT-REF ID-REF="ev.c"/></PARENT-REFS>
    </ECU-VARIANT>
    <ECU-VARIANT ID="ev.c"><SHORT-NAME>VariantC</SHORT-NAME>
      <PARENT-REFS><PARENT-REF ID-REF="ev.a"/></PARENT-REFS>
    </ECU-VARIANT>
    </ECU-VARIANTS>
    </DIAG-LAYER-CONTAINER></ODX>"#;
    let db = Database::from_xml(&[xml], LoadOptions::default()).unwrap();
    let a = db.layer_by_name("VariantA").unwrap();
    assert!(matches!(
        db.effective_layer(a),
        Err(LoadError::InheritanceCycle { .. })
    ));
}

const DANGLING_XML: &str = r#"<ODX xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
<DIAG-LAYER-CONTAINER ID="dlc.dangling"><SHORT-NAME>Dangling</SHORT-NAME>
<BASE-VARIANTS>
<BASE-VARIANT ID="bv.d"><SHORT-NAME>Broken</SHORT-NAME>
<DIAG-COMMS>
<DIAG-SERVICE ID="svc.d"><SHORT-NAME>Orphan</SHORT-NAME><REQUEST-REF ID-REF="rq.d"/></DIAG-SERVICE>
</DIAG-COMMS>
<REQUESTS>
<REQUEST ID="rq.d"><SHORT-NAME>RQ_Orphan</SHORT-NAME>
<PARAMS>
<PARAM xsi:type="VALUE"><SHORT-NAME>Value</SHORT-NAME><BYTE-POSITION>0</BYTE-POSITION><DOP-REF ID-REF="dop.missing"/></PARAM>
</PARAMS>
</REQUEST>
</REQUESTS>
</BASE-VARIANT>
</BASE-VARIANTS>
</DIAG-LAYER-CONTAINER></ODX>"#;

#[test]
fn strict_load_rejects_dangling_references() {
    let err = Database::from_xml(&[DANGLING_XML], LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::UnresolvedReference { .. }));
}

#[test]
fn lenient_load_defers_dangling_references_to_use() {
    let options = LoadOptions {
        strict: false,
        ..LoadOptions::default()
    };
    let db = Database::from_xml(&[DANGLING_XML], options).unwrap();
    let layer = db.layer_by_name("Broken").unwrap();
    let effective = db.effective_layer(layer).unwrap();

    let values = ParamValue::Struct(vec![("Value".into(), atomic(1))]);
    let err = db.encode_request(&effective, "Orphan", &values).unwrap_err();
    assert!(matches!(
        err,
        DispatchError::Codec(CodecError::UnresolvedReference { .. })
    ));
}

#[test]
fn duplicate_identifier_in_one_fragment_is_rejected() {
    let xml = r#"<ODX xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <DIAG-LAYER-CONTAINER ID="dlc.dup"><SHORT-NAME>Dup</SHORT-NAME>
    <BASE-VARIANTS>
    <BASE-VARIANT ID="bv.dup"><SHORT-NAME>Dup</SHORT-NAME>
    <DIAG-DATA-DICTIONARY-SPEC>
    <DATA-OBJECT-PROPS>
    <DATA-OBJECT-PROP ID="dop.twice"><SHORT-NAME>First</SHORT-NAME>
      <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
      <PHYSICAL-TYPE BASE-DATA-TYPE="A_UINT32"/>
    </DATA-OBJECT-PROP>
    <DATA-OBJECT-PROP ID="dop.twice"><SHORT-NAME>Second</SHORT-NAME>
      <COMPU-METHOD><CATEGORY>IDENTICAL</CATEGORY></COMPU-METHOD>
      <DIAG-CODED-TYPE xsi:type="STANDARD-LENGTH-TYPE" BASE-DATA-TYPE="A_UINT32"><BIT-LENGTH>8</BIT-LENGTH></DIAG-CODED-TYPE>
      <PHYSICAL-TYPE BASE-DATA-TYPE="A_UINT32"/>
    </DATA-OBJECT-PROP>
    </DATA-OBJECT-PROPS>
    </DIAG-DATA-DICTIONARY-SPEC>
    </BASE-VARIANT>
    </BASE-VARIANTS>
    </DIAG-LAYER-CONTAINER></ODX>"#;
    let err = Database::from_xml(&[xml], LoadOptions::default()).unwrap_err();
    assert!(matches!(err, LoadError::DuplicateIdentifier { .. }));
}
