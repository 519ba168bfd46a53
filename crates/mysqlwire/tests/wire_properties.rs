use mysqlwire::protocol::capabilities::{
    CLIENT_CONNECT_WITH_DB, CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA, CLIENT_PROTOCOL_41,
};
use mysqlwire::protocol::writer::build_packet_from_payload;
use mysqlwire::{
    Error, HandshakeResponse, Packet, PacketReader, PacketType, PacketWriter, ProtocolErrorKind,
};

fn frame(payload: &[u8], sequence_id: u8) -> Vec<u8> {
    build_packet_from_payload(payload, sequence_id)
}

#[test]
fn lenenc_small_values_use_direct_form() {
    for v in 0u64..=250 {
        let mut writer = PacketWriter::new();
        writer.write_lenenc_int(v);
        assert_eq!(writer.len(), 1, "value {v}");

        let mut reader = PacketReader::new(writer.as_bytes());
        assert_eq!(reader.read_lenenc_int().unwrap(), Some(v));
        assert!(reader.is_empty());
    }
}

#[test]
fn lenenc_500_uses_two_byte_form() {
    let mut writer = PacketWriter::new();
    writer.write_lenenc_int(500);
    assert_eq!(writer.as_bytes(), &[0xFC, 0xF4, 0x01]);

    let mut reader = PacketReader::new(writer.as_bytes());
    assert_eq!(reader.read_lenenc_int().unwrap(), Some(500));
}

#[test]
fn lenenc_null_is_not_a_string_length() {
    let mut reader = PacketReader::new(&[0xFB]);
    assert_eq!(reader.read_lenenc_int().unwrap(), None);

    let mut reader = PacketReader::new(&[0xFB]);
    let err = reader.read_lenenc_string().unwrap_err();
    assert_eq!(err.protocol_kind(), Some(ProtocolErrorKind::UnexpectedNull));
    assert!(err.is_connection_fatal());
}

#[test]
fn reader_is_bounded_by_header_length() {
    let mut data = frame(b"abcde", 2);
    // Trailing bytes from the next packet must stay invisible.
    data.extend_from_slice(&[0x01, 0x00, 0x00, 0x03, 0x2A]);

    let mut reader = PacketReader::create(&data, 0).unwrap();
    assert_eq!(reader.sequence_id(), 2);
    assert_eq!(reader.remaining(), 5);

    assert_eq!(reader.read_bytes(5).unwrap(), b"abcde");
    assert_eq!(reader.remaining(), 0);

    match reader.read_u8() {
        Err(Error::BufferUnderflow(u)) => {
            assert_eq!(u.needed, 1);
            assert_eq!(u.remaining, 0);
        }
        other => panic!("expected underflow, got {other:?}"),
    }

    // Zero-length reads always succeed.
    assert_eq!(reader.read_bytes(0).unwrap(), b"");
}

#[test]
fn next_reader_starts_at_limit() {
    let mut data = frame(b"abcde", 2);
    data.extend_from_slice(&frame(b"xy", 3));

    let first = PacketReader::create(&data, 0).unwrap();
    assert_eq!(first.limit(), 9);

    let mut second = first.create_next_reader().unwrap();
    assert_eq!(second.sequence_id(), 3);
    assert_eq!(second.read_bytes(2).unwrap(), b"xy");
    assert!(second.create_next_reader().is_err());
}

#[test]
fn handshake_response_with_lenenc_auth_only() {
    let auth = [0x5A; 20];
    let response = HandshakeResponse {
        capabilities: CLIENT_PROTOCOL_41 | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA,
        max_packet_size: 16 * 1024 * 1024,
        charset: 45,
        username: "user",
        auth_response: &auth,
        database: Some("ignored"),
        auth_plugin: "mysql_native_password",
        attributes: &[("ignored".to_string(), "too".to_string())],
    };
    let payload = response.to_payload().unwrap();

    let preamble = 4 + 4 + 1 + 23;
    let mut expected = Vec::new();
    expected.extend_from_slice(&response.capabilities.to_le_bytes());
    expected.extend_from_slice(&response.max_packet_size.to_le_bytes());
    expected.push(45);
    expected.extend_from_slice(&[0; 23]);
    expected.extend_from_slice(b"user\0");
    expected.push(20);
    expected.extend_from_slice(&auth);

    assert_eq!(payload.len(), preamble + 5 + 1 + 20);
    assert_eq!(payload, expected);
}

#[test]
fn handshake_response_database_gated_by_capability() {
    let response = HandshakeResponse {
        capabilities: CLIENT_PROTOCOL_41
            | CLIENT_PLUGIN_AUTH_LENENC_CLIENT_DATA
            | CLIENT_CONNECT_WITH_DB,
        max_packet_size: 0,
        charset: 45,
        username: "u",
        auth_response: &[],
        database: Some("db"),
        auth_plugin: "",
        attributes: &[],
    };
    let payload = response.to_payload().unwrap();
    assert!(payload.ends_with(b"u\0\0db\0"));
}

#[test]
fn err_packet_classified_with_code() {
    let mut payload = vec![0xFF, 0x26, 0x04, b'#'];
    payload.extend_from_slice(b"23000Duplicate entry '1' for key 'PRIMARY'");
    let data = frame(&payload, 1);

    let mut reader = PacketReader::create(&data, 0).unwrap();
    assert_eq!(reader.packet_type(CLIENT_PROTOCOL_41), PacketType::Error);
    assert!(reader.peek_is_error());

    match reader.classify(CLIENT_PROTOCOL_41).unwrap() {
        Packet::Error(err) => {
            assert_eq!(err.error_code, 1062);
            assert_eq!(err.sql_state, "23000");
            assert_eq!(err.error_message, "Duplicate entry '1' for key 'PRIMARY'");
        }
        other => panic!("expected ERR packet, got {other:?}"),
    }
    assert!(reader.is_empty());
}

#[test]
fn raise_if_error_surfaces_server_error() {
    let mut payload = vec![0xFF, 0x15, 0x04, b'#'];
    payload.extend_from_slice(b"28000Access denied for user 'app'@'localhost'");
    let mut reader = PacketReader::new(&payload);

    let err = reader.raise_if_error(CLIENT_PROTOCOL_41).unwrap_err();
    assert!(err.is_server_error());
    assert!(!err.is_connection_fatal());
    assert_eq!(err.server_code(), Some(1045));
    assert_eq!(err.sqlstate(), Some("28000"));
    match err {
        Error::Server(server) => assert!(server.is_access_denied()),
        other => panic!("expected server error, got {other:?}"),
    }
}

#[test]
fn ordinary_payload_is_left_unconsumed() {
    let mut reader = PacketReader::new(&[0x03, b'd', b'e', b'f']);
    assert!(matches!(reader.classify(CLIENT_PROTOCOL_41).unwrap(), Packet::Data));
    assert_eq!(reader.position(), 0);
    assert_eq!(reader.read_lenenc_string().unwrap(), "def");
}
