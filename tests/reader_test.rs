use std::io::{self, Cursor, Read};

use arcio::diagnostics::DiagnosisType;
use arcio::header::RecordHeader;
use arcio::reader::ArcReader;
use arcio::record::{Payload, Record, RecordType};
use arcio::version::{ArcVersion, VERSION_1_BLOCK_DEF};
use arcio::writer::ArcWriter;
use arcio::ArcError;
use sha1::{Digest, Sha1};

const VERSION_BLOCK_LINE: &str =
    "filedesc://archive 0.0.0.0 20060305082251 text/plain 76\n";
const VERSION_BLOCK_PAYLOAD: &str =
    "1 0 InternetArchive\nURL IP-address Archive-date Content-type Archive-length\n";
const HTML_RECORD: &str =
    "http://example.com/ 192.168.1.2 20060305082252 text/html 13\n<html></html>\n";

fn two_record_archive() -> Vec<u8> {
    let mut archive = String::new();
    archive.push_str(VERSION_BLOCK_LINE);
    archive.push_str(VERSION_BLOCK_PAYLOAD);
    archive.push('\n'); // record terminator
    archive.push_str(HTML_RECORD);
    archive.into_bytes()
}

fn v1_header(url: &str, ip: &str, date: &str, ctype: &str, length: usize) -> RecordHeader {
    let mut header = RecordHeader::new();
    header.url_str = Some(url.to_string());
    header.ip_address_str = Some(ip.to_string());
    header.archive_date_str = Some(date.to_string());
    header.content_type_str = Some(ctype.to_string());
    header.archive_length_str = Some(length.to_string());
    header.record_field_version = 1;
    header
}

fn version_block_record() -> Record {
    let payload = format!("1 0 InternetArchive\n{VERSION_1_BLOCK_DEF}\n").into_bytes();
    let mut record = Record::new(RecordType::VersionBlock, 0);
    record.header = v1_header(
        "filedesc://archive",
        "0.0.0.0",
        "20060305082251",
        "text/plain",
        payload.len(),
    );
    record.payload = Some(Payload::new(payload, 0));
    record
}

fn arc_record(url: &str, body: &[u8]) -> Record {
    let mut record = Record::new(RecordType::ArcRecord, 0);
    record.header = v1_header(url, "192.168.1.2", "20060305082252", "text/html", body.len());
    record.payload = Some(Payload::new(body.to_vec(), 0));
    record
}

#[test]
fn test_version_block_scenario() {
    let input = format!("{VERSION_BLOCK_LINE}{VERSION_BLOCK_PAYLOAD}");
    let mut reader = ArcReader::open(Cursor::new(input.into_bytes())).unwrap();

    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.record_type, RecordType::VersionBlock);
    let version_header = record.version_header.as_ref().unwrap();
    assert_eq!(version_header.version, Some(ArcVersion::V1_0));
    assert!(version_header.is_valid());
    assert!(!record.diagnostics.has_errors());
    assert!(!record.diagnostics.has_warnings());
    assert_eq!(record.payload.as_ref().unwrap().len(), 76);

    assert!(reader.next_record().unwrap().is_none());
    assert!(reader.is_compliant());
}

#[test]
fn test_two_record_archive_is_compliant() {
    let mut reader = ArcReader::open(Cursor::new(two_record_archive())).unwrap();

    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.record_type, RecordType::VersionBlock);
    assert_eq!(first.trailing_newlines, 1);
    assert_eq!(first.start_offset, 0);

    let second = reader.next_record().unwrap().unwrap();
    assert_eq!(second.record_type, RecordType::ArcRecord);
    assert_eq!(second.header.record_field_version, 1);
    assert_eq!(
        second.payload.as_ref().unwrap().block_bytes(),
        b"<html></html>"
    );
    assert_eq!(second.start_offset, first.consumed);

    assert!(reader.next_record().unwrap().is_none());
    assert!(reader.is_compliant());
    assert_eq!(reader.consumed(), two_record_archive().len() as u64);
}

#[test]
fn test_first_record_must_be_version_block() {
    let mut reader = ArcReader::open(Cursor::new(HTML_RECORD.as_bytes().to_vec())).unwrap();
    let record = reader.next_record().unwrap().unwrap();
    assert_eq!(record.record_type, RecordType::ArcRecord);
    assert!(record.is_compliant());
    assert!(reader.next_record().unwrap().is_none());

    assert!(!reader.is_compliant());
    let errors = reader.diagnostics().errors();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].kind, DiagnosisType::ErrorExpected);
    assert_eq!(errors[0].entity, "ARC file");
    assert_eq!(errors[0].info.len(), 2);
}

#[test]
fn test_second_version_block_is_flagged() {
    let mut archive = two_record_archive();
    archive.extend_from_slice(b"filedesc://other 0.0.0.0 20060305082251 text/plain 0\n\n");

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    let mut types = Vec::new();
    while let Some(record) = reader.next_record().unwrap() {
        types.push(record.record_type);
    }
    assert_eq!(
        types,
        [
            RecordType::VersionBlock,
            RecordType::ArcRecord,
            RecordType::VersionBlock
        ]
    );
    assert!(!reader.is_compliant());
    assert_eq!(reader.diagnostics().errors().len(), 1);
    assert_eq!(
        reader.diagnostics().errors()[0].kind,
        DiagnosisType::ErrorExpected
    );
}

#[test]
fn test_block_digest_over_payload() {
    let mut reader = ArcReader::open(Cursor::new(two_record_archive())).unwrap();
    reader.set_block_digest_algorithm(Some("sha1")).unwrap();
    reader.set_block_digest_encoding("base32");

    let record = reader.next_record().unwrap().unwrap();
    let digest = record.computed_block_digest.as_ref().unwrap();
    assert_eq!(
        digest.bytes,
        Sha1::digest(VERSION_BLOCK_PAYLOAD.as_bytes()).to_vec()
    );
    assert!(digest.encoded.is_some());
    assert!(!record.diagnostics.has_errors());

    let record = reader.next_record().unwrap().unwrap();
    let digest = record.computed_block_digest.as_ref().unwrap();
    assert_eq!(digest.bytes, Sha1::digest(b"<html></html>").to_vec());
}

#[test]
fn test_payload_digest_skips_sub_header() {
    let body = b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n\r\n<p>ok</p>";

    let mut sink = ArcWriter::new(Vec::new());
    sink.write_record(&version_block_record()).unwrap();
    sink.write_record(&arc_record("http://example.com/x", body)).unwrap();
    let archive = sink.into_inner().unwrap();

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    reader.set_block_digest_algorithm(Some("sha1")).unwrap();
    reader.set_payload_digest_algorithm(Some("sha1")).unwrap();

    reader.next_record().unwrap().unwrap();
    let record = reader.next_record().unwrap().unwrap();
    let payload = record.payload.as_ref().unwrap();
    assert!(payload.has_sub_header());
    assert!(payload.sub_header().starts_with(b"HTTP/1.1 200 OK"));
    assert_eq!(payload.payload_bytes(), b"<p>ok</p>");

    assert_eq!(
        record.computed_block_digest.as_ref().unwrap().bytes,
        Sha1::digest(body).to_vec()
    );
    assert_eq!(
        record.computed_payload_digest.as_ref().unwrap().bytes,
        Sha1::digest(b"<p>ok</p>").to_vec()
    );
}

#[test]
fn test_compressed_round_trip_and_offsets() {
    let mut writer = ArcWriter::new_compressed(Vec::new());
    writer.write_record(&version_block_record()).unwrap();
    writer.write_record(&arc_record("http://example.com/", b"<html></html>")).unwrap();
    let archive = writer.into_inner().unwrap();
    assert!(archive.starts_with(&[0x1f, 0x8b]));

    let mut reader = ArcReader::open(Cursor::new(archive.clone())).unwrap();
    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.record_type, RecordType::VersionBlock);
    assert!(first.version_header.as_ref().unwrap().is_valid());
    assert_eq!(first.start_offset, 0);
    assert!(first.consumed > 0);

    let second = reader.next_record().unwrap().unwrap();
    assert_eq!(second.record_type, RecordType::ArcRecord);
    assert_eq!(second.start_offset, first.consumed);
    assert_eq!(
        second.payload.as_ref().unwrap().block_bytes(),
        b"<html></html>"
    );

    assert!(reader.next_record().unwrap().is_none());
    assert!(reader.is_compliant());
    assert_eq!(reader.consumed(), archive.len() as u64);
}

#[test]
fn test_uncompressed_round_trip_preserves_fields() {
    let mut writer = ArcWriter::new(Vec::new());
    writer.write_record(&version_block_record()).unwrap();
    writer.write_record(&arc_record("http://example.com/a", b"aaaa")).unwrap();
    let archive = writer.into_inner().unwrap();

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    reader.next_record().unwrap().unwrap();
    let record = reader.next_record().unwrap().unwrap();
    let header = &record.header;
    assert_eq!(header.url_str.as_deref(), Some("http://example.com/a"));
    assert_eq!(header.ip_address_str.as_deref(), Some("192.168.1.2"));
    assert_eq!(header.archive_date_str.as_deref(), Some("20060305082252"));
    assert_eq!(header.content_type_str.as_deref(), Some("text/html"));
    assert_eq!(header.archive_length, Some(4));
    assert!(header.url.is_some());
    assert!(header.ip_address.is_some());
    assert!(header.archive_date.is_some());
    assert!(reader.is_compliant());
}

#[test]
fn test_ten_field_round_trip_with_absent_fields() {
    let mut header = v1_header(
        "http://example.com/b",
        "10.0.0.1",
        "20060305082253",
        "text/plain",
        3,
    );
    header.record_field_version = 2;
    header.result_code_str = Some("200".to_string());
    // checksum, location, offset, filename stay absent.

    let mut record = Record::new(RecordType::ArcRecord, 0);
    record.header = header;
    record.payload = Some(Payload::new(b"abc".to_vec(), 0));

    let mut writer = ArcWriter::new(Vec::new());
    writer.write_record(&version_block_record()).unwrap();
    writer.write_record(&record).unwrap();
    let archive = writer.into_inner().unwrap();

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    reader.next_record().unwrap().unwrap();
    let read_back = reader.next_record().unwrap().unwrap();
    assert_eq!(read_back.header.record_field_version, 2);
    assert_eq!(read_back.header.result_code, Some(200));
    assert!(read_back.header.checksum_str.is_none());
    assert!(read_back.header.location_str.is_none());
    assert!(read_back.header.offset_str.is_none());
    assert!(read_back.header.filename_str.is_none());
    assert!(read_back.is_compliant());
}

#[test]
fn test_payload_length_mismatch_is_diagnosed() {
    let input = b"filedesc://a 0.0.0.0 20060305082251 text/plain 100\nshort".to_vec();
    let mut reader = ArcReader::open(Cursor::new(input)).unwrap();
    let record = reader.next_record().unwrap().unwrap();
    let errors = record.diagnostics.errors();
    assert!(errors
        .iter()
        .any(|d| d.kind == DiagnosisType::InvalidData && d.entity == "record payload"));
    assert!(reader.next_record().unwrap().is_none());
    assert!(!reader.is_compliant());
}

#[test]
fn test_extra_trailing_newlines_are_diagnosed() {
    let mut archive = Vec::new();
    archive.extend_from_slice(VERSION_BLOCK_LINE.as_bytes());
    archive.extend_from_slice(VERSION_BLOCK_PAYLOAD.as_bytes());
    archive.extend_from_slice(b"\n\n"); // one terminator too many
    archive.extend_from_slice(HTML_RECORD.as_bytes());

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    let first = reader.next_record().unwrap().unwrap();
    assert_eq!(first.trailing_newlines, 2);
    assert!(first
        .diagnostics
        .errors()
        .iter()
        .any(|d| d.kind == DiagnosisType::InvalidExpected && d.entity == "record terminator"));

    // The following record is unaffected.
    let second = reader.next_record().unwrap().unwrap();
    assert!(second.is_compliant());
    assert!(!reader.is_compliant());
}

#[test]
fn test_unparseable_length_resumes_at_next_line() {
    let mut archive = Vec::new();
    archive.extend_from_slice(VERSION_BLOCK_LINE.as_bytes());
    archive.extend_from_slice(VERSION_BLOCK_PAYLOAD.as_bytes());
    archive.push(b'\n');
    archive.extend_from_slice(
        b"http://example.com/bad 1.2.3.4 20060305082252 text/plain many\n",
    );
    archive.extend_from_slice(HTML_RECORD.as_bytes());

    let mut reader = ArcReader::open(Cursor::new(archive)).unwrap();
    reader.next_record().unwrap().unwrap();

    let bad = reader.next_record().unwrap().unwrap();
    assert!(bad.payload.is_none());
    assert!(bad.diagnostics.has_errors());

    let good = reader.next_record().unwrap().unwrap();
    assert_eq!(good.payload.as_ref().unwrap().block_bytes(), b"<html></html>");
    assert!(reader.next_record().unwrap().is_none());
}

// ── Iterator adapter ─────────────────────────────────────────────────────────

struct FailingTransport {
    data: Vec<u8>,
    pos:  usize,
}

impl Read for FailingTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() {
            return Err(io::Error::new(io::ErrorKind::Other, "transport failure"));
        }
        let n = buf.len().min(self.data.len() - self.pos);
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

#[test]
fn test_iterator_captures_transport_fault() {
    let mut data = Vec::new();
    data.extend_from_slice(VERSION_BLOCK_LINE.as_bytes());
    data.extend_from_slice(VERSION_BLOCK_PAYLOAD.as_bytes());
    data.push(b'\n');
    // Header declares payload bytes the transport will fail to deliver.
    data.extend_from_slice(b"http://example.com/ 1.2.3.4 20060305082252 text/plain 10\n");

    let mut reader = ArcReader::open(FailingTransport { data, pos: 0 }).unwrap();
    let collected: Vec<_> = reader.records().collect();
    assert_eq!(collected.len(), 1);
    assert_eq!(collected[0].record_type, RecordType::VersionBlock);

    assert!(matches!(reader.iterator_fault(), Some(ArcError::Io(_))));
    // Iteration stays ended; the fault is not re-raised.
    assert!(reader.records().next().is_none());
}

// ── Random access ────────────────────────────────────────────────────────────

#[test]
fn test_detached_reader_random_access() {
    let archive = two_record_archive();
    let second_offset =
        (VERSION_BLOCK_LINE.len() + VERSION_BLOCK_PAYLOAD.len() + 1) as u64;

    let mut reader = ArcReader::open_detached(Cursor::new(archive)).unwrap();
    let record = reader.next_record_from(second_offset).unwrap().unwrap();
    assert_eq!(record.record_type, RecordType::ArcRecord);
    assert_eq!(record.start_offset, second_offset);
    assert_eq!(
        record.payload.as_ref().unwrap().block_bytes(),
        b"<html></html>"
    );

    let record = reader.next_record_from(0).unwrap().unwrap();
    assert_eq!(record.record_type, RecordType::VersionBlock);

    // Sequential access on a detached reader is a state fault.
    assert!(matches!(
        reader.next_record(),
        Err(ArcError::InvalidState { .. })
    ));
}

#[test]
fn test_detached_compressed_random_access() {
    let mut writer = ArcWriter::new_compressed(Vec::new());
    writer.write_record(&version_block_record()).unwrap();
    writer.write_record(&arc_record("http://example.com/", b"<html></html>")).unwrap();
    let archive = writer.into_inner().unwrap();

    // Locate the second member by reading sequentially first.
    let mut sequential = ArcReader::open(Cursor::new(archive.clone())).unwrap();
    let first = sequential.next_record().unwrap().unwrap();
    let second_offset = first.consumed;

    let mut reader = ArcReader::open_detached(Cursor::new(archive)).unwrap();
    let record = reader
        .next_record_from_buffered(second_offset, 4096)
        .unwrap()
        .unwrap();
    assert_eq!(record.record_type, RecordType::ArcRecord);
    assert_eq!(record.start_offset, second_offset);
    assert_eq!(
        record.payload.as_ref().unwrap().block_bytes(),
        b"<html></html>"
    );
}

#[test]
fn test_access_modes_do_not_mix() {
    let mut sequential = ArcReader::open(Cursor::new(two_record_archive())).unwrap();
    sequential.next_record().unwrap().unwrap();
    assert!(matches!(
        sequential.next_record_from(0),
        Err(ArcError::InvalidState { .. })
    ));

    let mut detached = ArcReader::open_detached(Cursor::new(two_record_archive())).unwrap();
    assert!(matches!(
        detached.next_record_from_buffered(0, 0),
        Err(ArcError::InvalidArgument { .. })
    ));
}

#[test]
fn test_reader_close_is_idempotent() {
    let mut reader = ArcReader::open(Cursor::new(two_record_archive())).unwrap();
    reader.next_record().unwrap().unwrap();
    reader.close();
    reader.close();
    reader.close();
    assert!(matches!(
        reader.next_record(),
        Err(ArcError::InvalidState { .. })
    ));
}
