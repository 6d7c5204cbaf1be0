use std::io::{BufReader, Read, Seek};

use quick_xml::de::from_str;
use serde::Deserialize;
use thiserror::Error;

/// TIFF tag holding the XMP packet.
const XMP_TAG: u16 = 700;

#[derive(Error, Debug)]
pub enum Error {
    #[error("could not read TIFF structure")]
    Tiff(#[from] tiff::TiffError),
    #[error("XMP packet is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("could not parse XMP packet")]
    Xml(#[from] quick_xml::de::DeError),
}

#[derive(Debug, Deserialize)]
struct Alt {
    li: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct Title {
    #[serde(rename = "Alt")]
    alt: Alt,
}

#[derive(Debug, Deserialize)]
struct Description {
    #[serde(rename = "xmp:CreateDate")]
    create_date: Option<String>,
    title: Option<Title>,
}

#[derive(Debug, Deserialize)]
struct Rdf {
    #[serde(rename = "Description")]
    description: Vec<Description>,
}

#[derive(Debug, Deserialize)]
struct XmpMeta {
    #[serde(rename = "RDF")]
    rdf: Rdf,
}

#[derive(Debug, Default, PartialEq)]
pub struct XmpMetadata {
    pub create_date: Option<String>,
    pub title: Option<String>,
}

pub fn read_xmp_packet<R: Read + Seek>(read: R) -> Result<String, Error> {
    let bufreader = BufReader::new(read);
    let mut decoder = tiff::decoder::Decoder::new(bufreader)?;

    let xmp_tag_data = decoder.get_tag(tiff::tags::Tag::Unknown(XMP_TAG))?;
    let xmp_bytes: Vec<_> = xmp_tag_data
        .into_u64_vec()?
        .into_iter()
        .map(|v| v as u8)
        .collect();

    Ok(String::from_utf8(xmp_bytes)?)
}

/// Editors may spread properties over several `rdf:Description` elements;
/// the first occurrence of each one wins.
pub fn parse_xmp(xml: &str) -> Result<XmpMetadata, Error> {
    let parsed: XmpMeta = from_str(xml)?;

    let mut metadata = XmpMetadata::default();
    for description in parsed.rdf.description {
        if metadata.create_date.is_none() {
            metadata.create_date = description.create_date;
        }
        if metadata.title.is_none() {
            metadata.title = description
                .title
                .and_then(|title| title.alt.li.into_iter().next());
        }
    }

    Ok(metadata)
}
