use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("xml parse error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("xml attribute error: {0}")]
    Attr(#[from] quick_xml::events::attributes::AttrError),
    #[error("xml contained invalid utf-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("entity element missing required attribute '{0}'")]
    MissingAttribute(&'static str),
    #[error("unrecognized data type '{0}' on field '{1}'")]
    UnknownDataType(String, String),
    #[error("malformed value for field '{field}': {message}")]
    MalformedValue { field: String, message: String },
    #[error("document ended before closing element '{0}'")]
    UnexpectedEof(&'static str),
}
