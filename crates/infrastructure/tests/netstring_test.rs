use tlspol_domain::TlspolError;
use tlspol_infrastructure::socketmap::netstring::{encode, read_frame};
use tokio::io::BufReader;

async fn decode_one(input: &[u8]) -> Result<Option<Vec<u8>>, TlspolError> {
    let mut reader = BufReader::new(input);
    read_frame(&mut reader).await
}

#[tokio::test]
async fn encodes_with_length_prefix() {
    assert_eq!(encode(b"NOTFOUND "), b"9:NOTFOUND ,");
    assert_eq!(encode(b""), b"0:,");
    assert_eq!(encode(b"QUERY example.com"), b"17:QUERY example.com,");
}

#[tokio::test]
async fn decodes_the_notfound_reply() {
    let frame = decode_one(b"9:NOTFOUND ,").await.unwrap().unwrap();
    assert_eq!(frame, b"NOTFOUND ");
}

#[tokio::test]
async fn round_trips_arbitrary_payloads() {
    for payload in [
        b"".as_slice(),
        b"QUERY example.com",
        b"OK secure match=.example.com servername=hostname",
        &[0u8, 1, 2, 255],
    ] {
        let frame = decode_one(&encode(payload)).await.unwrap().unwrap();
        assert_eq!(frame, payload);
    }
}

#[tokio::test]
async fn reads_consecutive_frames() {
    let mut input = encode(b"first");
    input.extend_from_slice(&encode(b"second"));
    let mut reader = BufReader::new(input.as_slice());
    assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), b"first");
    assert_eq!(read_frame(&mut reader).await.unwrap().unwrap(), b"second");
    assert!(read_frame(&mut reader).await.unwrap().is_none());
}

#[tokio::test]
async fn clean_eof_yields_none() {
    assert!(decode_one(b"").await.unwrap().is_none());
}

#[tokio::test]
async fn rejects_leading_zero_in_length() {
    assert!(decode_one(b"05:hello,").await.is_err());
    assert!(decode_one(b"00:,").await.is_err());
    // A bare zero length is fine.
    assert_eq!(decode_one(b"0:,").await.unwrap().unwrap(), b"");
}

#[tokio::test]
async fn rejects_malformed_headers() {
    assert!(decode_one(b":payload,").await.is_err());
    assert!(decode_one(b"abc:x,").await.is_err());
    assert!(decode_one(b"5x:hello,").await.is_err());
}

#[tokio::test]
async fn rejects_missing_terminator() {
    assert!(decode_one(b"5:hello;").await.is_err());
    assert!(decode_one(b"5:hello").await.is_err());
}

#[tokio::test]
async fn rejects_truncated_payload() {
    assert!(decode_one(b"10:short,").await.is_err());
    assert!(decode_one(b"5").await.is_err());
}

#[tokio::test]
async fn rejects_oversized_frames() {
    assert!(decode_one(b"99999999:x,").await.is_err());
}
