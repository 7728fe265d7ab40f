//! Roster snapshot parsing from the mixer's XML state document.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use vptz_core::{PanScale, Xyz};

use crate::error::{MixerError, MixerResult};

/// Input type that carries a pan/zoom position.
pub const VIRTUAL_SET: &str = "VirtualSet";

/// One input as reported by a roster snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct RosterInput {
    pub number: u32,
    pub title: String,
    pub kind: String,
    /// Reported geometry in stored units; neutral for non-framing inputs.
    pub xyz: Xyz,
}

impl RosterInput {
    pub fn is_virtual_set(&self) -> bool {
        self.kind == VIRTUAL_SET
    }
}

/// Parsed XML state document of one instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RosterSnapshot {
    pub inputs: Vec<RosterInput>,
    /// Input number on program.
    pub active: Option<u32>,
    /// Input number on preview.
    pub preview: Option<u32>,
}

impl RosterSnapshot {
    /// Title of the input with the given number.
    pub fn title_of(&self, number: Option<u32>) -> &str {
        number
            .and_then(|n| self.inputs.iter().find(|i| i.number == n))
            .map(|i| i.title.as_str())
            .unwrap_or("")
    }

    /// Parse a state document. Pan values are converted from mixer units
    /// through `scale`; zoom is taken as-is.
    pub fn parse(xml: &str, scale: PanScale) -> MixerResult<Self> {
        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut snapshot = Self::default();
        let mut path: Vec<String> = Vec::new();
        let mut saw_root = false;

        loop {
            match reader.read_event()? {
                Event::Eof => break,
                Event::Start(ref e) => {
                    let name = element_name(e);
                    handle_element(&mut snapshot, &path, e, &name, scale)?;
                    if path.is_empty() && name == "vmix" {
                        saw_root = true;
                    }
                    path.push(name);
                }
                Event::Empty(ref e) => {
                    let name = element_name(e);
                    handle_element(&mut snapshot, &path, e, &name, scale)?;
                    if path.is_empty() && name == "vmix" {
                        saw_root = true;
                    }
                }
                Event::Text(ref e) => {
                    let under_root = path.len() == 2 && path[0] == "vmix";
                    if !under_root {
                        continue;
                    }
                    let text = e
                        .unescape()
                        .map_err(|err| MixerError::MalformedXml(err.to_string()))?;
                    match path[1].as_str() {
                        "active" => snapshot.active = text.trim().parse().ok(),
                        "preview" => snapshot.preview = text.trim().parse().ok(),
                        _ => {}
                    }
                }
                Event::End(_) => {
                    path.pop();
                }
                _ => {}
            }
        }

        if !path.is_empty() {
            return Err(MixerError::MalformedXml(format!("unclosed <{}>", path.join("/"))));
        }
        if !saw_root {
            return Err(MixerError::MalformedXml("missing <vmix> root element".into()));
        }
        Ok(snapshot)
    }
}

fn element_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().as_ref()).to_string()
}

fn handle_element(
    snapshot: &mut RosterSnapshot,
    path: &[String],
    e: &BytesStart<'_>,
    name: &str,
    scale: PanScale,
) -> MixerResult<()> {
    let parent = path.last().map(String::as_str);
    match (parent, name) {
        (Some("inputs"), "input") if path.len() == 2 => {
            let mut number = None;
            let mut title = String::new();
            let mut kind = String::new();
            for attr in e.attributes().flatten() {
                let value = attr
                    .unescape_value()
                    .map_err(|err| MixerError::MalformedXml(err.to_string()))?;
                match attr.key.as_ref() {
                    b"number" => number = value.trim().parse::<u32>().ok(),
                    b"title" => title = value.to_string(),
                    b"type" => kind = value.to_string(),
                    _ => {}
                }
            }
            let number = number
                .ok_or_else(|| MixerError::MalformedXml(format!("input \"{title}\" has no number")))?;
            snapshot.inputs.push(RosterInput {
                number,
                title,
                kind,
                xyz: Xyz::NEUTRAL,
            });
        }
        (Some("input"), "position") if path.len() == 3 => {
            let Some(input) = snapshot.inputs.last_mut() else {
                return Ok(());
            };
            if !input.is_virtual_set() {
                return Ok(());
            }
            for attr in e.attributes().flatten() {
                let value = attr
                    .unescape_value()
                    .map_err(|err| MixerError::MalformedXml(err.to_string()))?;
                let parse = || {
                    value.trim().parse::<f64>().map_err(|_| {
                        MixerError::MalformedXml(format!("bad position value \"{value}\""))
                    })
                };
                match attr.key.as_ref() {
                    b"panX" => input.xyz.x = scale.from_wire(parse()?),
                    b"panY" => input.xyz.y = scale.from_wire(parse()?),
                    b"zoomX" => input.xyz.zoom = parse()?,
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(())
}
