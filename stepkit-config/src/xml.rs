//! XML settings codec.
//!
//! The reader is driven as a small state machine so that text outside the
//! root, unexpected elements and truncated documents are all rejected, not
//! only what the tokenizer itself flags.

use crate::{HandlerConfig, ParseError};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

const ROOT: &[u8] = b"config";
const SETTING: &[u8] = b"setting";

enum State {
    BeforeRoot,
    InRoot,
    InSetting { name: String, value: String },
    AfterRoot,
}

pub(crate) fn parse(blob: &str) -> Result<HandlerConfig, ParseError> {
    let mut reader = Reader::from_str(blob);
    reader.config_mut().trim_text(false);
    reader.config_mut().check_end_names = true;

    let mut config = HandlerConfig::new();
    let mut state = State::BeforeRoot;

    loop {
        let event = reader.read_event().map_err(xml_error)?;
        state = match (state, event) {
            (State::BeforeRoot, Event::Start(e)) => {
                expect_root(&e)?;
                State::InRoot
            }
            (State::BeforeRoot, Event::Empty(e)) => {
                expect_root(&e)?;
                State::AfterRoot
            }
            (State::InRoot, Event::Start(e)) => State::InSetting {
                name: setting_name(&e)?,
                value: String::new(),
            },
            (State::InRoot, Event::Empty(e)) => {
                config.set(setting_name(&e)?, "");
                State::InRoot
            }
            (State::InRoot, Event::End(_)) => State::AfterRoot,
            (State::InSetting { name, mut value }, Event::Text(text)) => {
                value.push_str(&text.unescape().map_err(xml_error)?);
                State::InSetting { name, value }
            }
            (State::InSetting { name, mut value }, Event::CData(data)) => {
                value.push_str(&String::from_utf8_lossy(&data));
                State::InSetting { name, value }
            }
            (State::InSetting { name, value }, Event::End(_)) => {
                config.set(name, value);
                State::InRoot
            }
            (State::InSetting { .. }, Event::Start(e) | Event::Empty(e)) => {
                return Err(ParseError::Structure(format!(
                    "unexpected element <{}> inside <setting>",
                    element_name(&e)
                )));
            }
            (state, Event::Text(text)) if is_blank(&text) => state,
            (_, Event::Text(_) | Event::CData(_)) => {
                return Err(ParseError::Structure(
                    "text outside of a <setting> element".to_string(),
                ));
            }
            (state, Event::Comment(_) | Event::PI(_)) => state,
            (State::BeforeRoot, Event::Decl(_) | Event::DocType(_)) => State::BeforeRoot,
            (State::AfterRoot, Event::Eof) => return Ok(config),
            (State::BeforeRoot, Event::Eof) => {
                return Err(ParseError::Structure(
                    "document has no <config> root element".to_string(),
                ));
            }
            (_, Event::Eof) => {
                return Err(ParseError::Structure(
                    "unexpected end of document inside <config>".to_string(),
                ));
            }
            (_, Event::Start(e) | Event::Empty(e)) => {
                return Err(ParseError::Structure(format!(
                    "unexpected element <{}>",
                    element_name(&e)
                )));
            }
            (_, other) => {
                return Err(ParseError::Structure(format!(
                    "unexpected markup {other:?}"
                )));
            }
        };
    }
}

pub(crate) fn serialize(config: &HandlerConfig) -> Result<String, ParseError> {
    let mut writer = Writer::new(Vec::new());
    writer
        .write_event(Event::Start(BytesStart::new("config")))
        .map_err(xml_error)?;
    for setting in config {
        let mut start = BytesStart::new("setting");
        start.push_attribute(("name", setting.name()));
        writer.write_event(Event::Start(start)).map_err(xml_error)?;
        writer
            .write_event(Event::Text(BytesText::new(setting.value())))
            .map_err(xml_error)?;
        writer
            .write_event(Event::End(BytesEnd::new("setting")))
            .map_err(xml_error)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new("config")))
        .map_err(xml_error)?;
    String::from_utf8(writer.into_inner()).map_err(xml_error)
}

fn expect_root(element: &BytesStart<'_>) -> Result<(), ParseError> {
    if element.name().as_ref() == ROOT {
        Ok(())
    } else {
        Err(ParseError::Structure(format!(
            "expected <config> root element, found <{}>",
            element_name(element)
        )))
    }
}

fn setting_name(element: &BytesStart<'_>) -> Result<String, ParseError> {
    if element.name().as_ref() != SETTING {
        return Err(ParseError::Structure(format!(
            "unexpected element <{}> inside <config>",
            element_name(element)
        )));
    }
    let attribute = element
        .try_get_attribute("name")
        .map_err(xml_error)?
        .ok_or_else(|| {
            ParseError::Structure("<setting> element is missing its name attribute".to_string())
        })?;
    Ok(attribute.unescape_value().map_err(xml_error)?.into_owned())
}

fn element_name(element: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(element.name().as_ref()).into_owned()
}

fn is_blank(text: &BytesText<'_>) -> bool {
    text.iter().all(u8::is_ascii_whitespace)
}

fn xml_error<E>(error: E) -> ParseError
where
    E: std::error::Error + Send + Sync + 'static,
{
    ParseError::Xml(Box::new(error))
}
