// tests/codec.rs
use anyhow::Result;
use reddit_split::io::delimited::{RecordReader, RecordWriter, detect_delimiter, read_records, write_records};
use reddit_split::schema::{Column, ColumnType};
use reddit_split::*;
use std::fs;

fn typed_schema() -> Schema {
    Schema::new(vec![
        Column::string("user_id"),
        Column::new("score", ColumnType::Int),
        Column::new("is_suspended", ColumnType::Bool),
    ])
}

fn rec(user: &str, score: i64, suspended: bool) -> Record {
    Record::new(vec![
        Value::Str(user.to_string()),
        Value::Int(score),
        Value::Bool(suspended),
    ])
}

#[test]
fn typed_values_survive_a_write_and_read() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("nested").join("out.csv");
    let schema = typed_schema();
    let data = vec![rec("u1", 3, false), rec("u2, with comma", -7, true), rec("", 0, false)];

    assert_eq!(write_records(&path, &schema, &data)?, 3);
    let text = fs::read_to_string(&path)?;
    assert!(text.starts_with("user_id,score,is_suspended\n"));
    assert!(text.contains("\"u2, with comma\",-7,true"));

    assert_eq!(read_records(&path, &schema, HeaderMode::Present)?, data);
    assert_eq!(read_records(&path, &schema, HeaderMode::Auto)?, data);
    Ok(())
}

#[test]
fn malformed_rows_are_skipped_and_counted() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("a.csv");
    fs::write(
        &path,
        "user_id,score,is_suspended\nu1,1,true\nu2,not-a-number,false\nu3,2\nu4,4,maybe\nu5,5,0\n",
    )?;
    let schema = typed_schema();
    let mut reader = RecordReader::open(&path, &schema, HeaderMode::Auto)?;
    let got: Vec<Record> = reader.by_ref().collect::<Result<_>>()?;

    assert_eq!(got, vec![rec("u1", 1, true), rec("u5", 5, false)]);
    assert_eq!(reader.malformed(), 3);
    assert_eq!(reader.rows_read(), 6);
    Ok(())
}

#[test]
fn header_modes() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let schema = Schema::strings(&["endpoint_ts", "user_id"]);

    let with_header = dir.path().join("h.csv");
    fs::write(&with_header, "endpoint_ts,user_id\n1,u1\n")?;
    let without = dir.path().join("n.csv");
    fs::write(&without, "1,u1\n2,u2\n")?;

    assert_eq!(read_records(&with_header, &schema, HeaderMode::Auto)?.len(), 1);
    assert_eq!(read_records(&with_header, &schema, HeaderMode::Present)?.len(), 1);
    // Absent: the header line is just a row of strings.
    assert_eq!(read_records(&with_header, &schema, HeaderMode::Absent)?.len(), 2);

    assert_eq!(read_records(&without, &schema, HeaderMode::Auto)?.len(), 2);
    assert_eq!(read_records(&without, &schema, HeaderMode::Absent)?.len(), 2);
    // Present: the first data row is consumed as the header.
    assert_eq!(read_records(&without, &schema, HeaderMode::Present)?.len(), 1);
    Ok(())
}

#[test]
fn empty_and_header_only_files_yield_nothing() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let schema = Schema::strings(&["endpoint_ts", "user_id"]);
    let empty = dir.path().join("empty.csv");
    fs::write(&empty, "")?;
    let header_only = dir.path().join("header.csv");
    fs::write(&header_only, "endpoint_ts,user_id\n")?;

    for mode in [HeaderMode::Auto, HeaderMode::Present, HeaderMode::Absent] {
        assert!(read_records(&empty, &schema, mode)?.is_empty());
    }
    assert!(read_records(&header_only, &schema, HeaderMode::Auto)?.is_empty());
    Ok(())
}

#[test]
fn tab_separated_files() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let schema = Schema::strings(&["endpoint_ts", "user_id", "sr_name"]);

    let by_ext = dir.path().join("a.tsv");
    fs::write(&by_ext, "endpoint_ts\tuser_id\tsr_name\n1\tu1\tfoo, bar\n")?;
    let sniffed = dir.path().join("b.txt");
    fs::write(&sniffed, "1\tu1\tpics\n")?;

    assert_eq!(detect_delimiter(&by_ext, &schema)?, b'\t');
    assert_eq!(detect_delimiter(&sniffed, &schema)?, b'\t');

    let a = read_records(&by_ext, &schema, HeaderMode::Auto)?;
    assert_eq!(a[0].get(2), Some(&Value::Str("foo, bar".into())));
    let b = read_records(&sniffed, &schema, HeaderMode::Auto)?;
    assert_eq!(b[0].get(1), Some(&Value::Str("u1".into())));
    Ok(())
}

#[test]
fn headerless_tab_file_with_commas_in_a_field() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let schema = Schema::strings(&["endpoint_ts", "user_id", "comment_body"]);
    let path = dir.path().join("part-0");
    fs::write(&path, "1\tu1\thello, world\n2\tu2\tplain\n")?;

    assert_eq!(detect_delimiter(&path, &schema)?, b'\t');
    let mut reader = RecordReader::open(&path, &schema, HeaderMode::Auto)?;
    let records = reader.by_ref().collect::<Result<Vec<_>>>()?;
    assert_eq!(reader.malformed(), 0);
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].get(2), Some(&Value::Str("hello, world".into())));
    Ok(())
}

#[test]
fn missing_file_is_an_error() {
    let schema = Schema::strings(&["user_id"]);
    assert!(RecordReader::open("/definitely/not/here.csv", &schema, HeaderMode::Auto).is_err());
}

#[test]
fn writer_rejects_wrong_arity() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let schema = typed_schema();
    let mut w = RecordWriter::create(dir.path().join("x.csv"), &schema, b',')?;
    assert!(w.write(&Record::new(vec![Value::Str("u1".into())])).is_err());
    w.write(&rec("u1", 1, true))?;
    assert_eq!(w.finish()?, 1);
    Ok(())
}

#[test]
fn bool_parsing_accepts_words_and_digits() {
    assert_eq!(Value::parse("TRUE", ColumnType::Bool), Some(Value::Bool(true)));
    assert_eq!(Value::parse("0", ColumnType::Bool), Some(Value::Bool(false)));
    assert_eq!(Value::parse("yes", ColumnType::Bool), None);
    assert_eq!(Value::parse(" 42 ", ColumnType::Int), Some(Value::Int(42)));
    assert_eq!(Value::parse("4.2", ColumnType::Int), None);
}

#[test]
fn record_field_lookup() -> Result<()> {
    let schema = typed_schema();
    let r = Record::from_fields(&schema, &["u9", "12", "false"])?;
    assert_eq!(r.field(&schema, "score"), Some(&Value::Int(12)));
    assert_eq!(r.field(&schema, "nope"), None);
    assert!(Record::from_fields(&schema, &["u9", "12"]).is_err());
    Ok(())
}

#[test]
fn field_errors_describe_the_bad_field() {
    let schema = typed_schema();
    let arity = Record::from_fields(&schema, &["u9", "12"]).unwrap_err();
    assert_eq!(arity, reddit_split::record::FieldError::Arity { expected: 3, found: 2 });
    assert_eq!(arity.to_string(), "expected 3 columns, found 2");

    let ty = Record::from_fields(&schema, &["u9", "twelve", "false"]).unwrap_err();
    assert_eq!(ty.to_string(), "column `score`: cannot parse \"twelve\" as Int");

    let err: anyhow::Error = ty.into();
    assert!(err.to_string().starts_with("column `score`"));
}
