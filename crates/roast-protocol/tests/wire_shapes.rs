use expect_test::expect;
use roast_protocol::{
    decode_frame, DecodeError, InboundFrame, LifecycleCommand, OutboundEnvelope, Parameter,
    ParameterValue, ProgramProfile,
};
use serde_json::json;

#[test]
fn controller_status_snapshot_decodes_every_field() {
    // Snapshot as the controller sends it after every client message.
    let raw = r#"{"type":"status","data":{"state":0,"programMode":0,"temperature":23.5,"setpoint":100,"ramp_rate":0,"output":0,"duty_cycle":0,"p":10,"i":1,"d":0.5}}"#;
    let InboundFrame::Status(delta) = decode_frame(raw) else {
        panic!("status frame expected");
    };
    assert_eq!(delta.len(), 10);
    let first = delta.get_index(0).map(|(key, _)| key.as_str());
    assert_eq!(first, Some("state"));
    assert_eq!(delta["temperature"], json!(23.5));
}

#[test]
fn log_broadcast_is_ignored_with_reason() {
    let frame = decode_frame(r#"{"type":"log","data":"heater on"}"#);
    assert_eq!(
        frame,
        InboundFrame::Unrecognized {
            raw: r#"{"type":"log","data":"heater on"}"#.into(),
            reason: DecodeError::UnsupportedType("log".into()),
        }
    );
}

#[test]
fn outbound_envelopes_round_through_the_controller_parser() {
    let program = r#"{"program_name":"full city","program_steps":[{"step_name":"dry","target_temp":160,"ramp_rate":15,"hold_time":30}]}"#;
    let profile = ProgramProfile::from_json_str(program).expect("profile");
    let envelopes = [
        OutboundEnvelope::command(LifecycleCommand::ProgramMode),
        OutboundEnvelope::parameter(Parameter::D, ParameterValue::Float(0.75)),
        OutboundEnvelope::UploadProgram(profile),
    ];
    for envelope in envelopes {
        let decoded = OutboundEnvelope::decode(&envelope.encode()).expect("decode");
        assert_eq!(decoded, envelope);
    }
}

#[test]
fn mode_switch_wire_text() {
    expect![[r#"{"commands":["simple_mode"]}"#]]
        .assert_eq(&OutboundEnvelope::command(LifecycleCommand::SimpleMode).encode());
}
