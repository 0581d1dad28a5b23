//! XML body of a vault file.
//!
//! The document is written without indentation and read with whitespace
//! preserved, so every string field survives a round trip byte for byte.
//!
//! ```xml
//! <PwVault>
//!   <Meta>...</Meta>
//!   <Groups><Group>...</Group></Groups>
//!   <Entries><Entry>...</Entry></Entries>
//!   <DeletedObjects><DeletedObject>...</DeletedObject></DeletedObjects>
//! </PwVault>
//! ```

use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use uuid::Uuid;
use zeroize::{Zeroize, Zeroizing};

use crate::database::{DeletedObject, VaultDatabase, VaultMetadata};
use crate::entry::{CustomField, EntryTimes, PasswordEntry, PasswordHistoryEntry};
use crate::group::Group;
use pwvault_common::{Error, Result};

const ROOT: &str = "PwVault";

fn xml_error(context: &str, e: impl std::fmt::Display) -> Error {
    Error::Serialization(format!("XML {} error: {}", context, e))
}

fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::AutoSi, true)
}

fn format_bool(value: bool) -> &'static str {
    if value {
        "True"
    } else {
        "False"
    }
}

struct XmlOut {
    writer: Writer<Vec<u8>>,
}

impl XmlOut {
    fn new() -> Self {
        Self {
            writer: Writer::new(Vec::with_capacity(4096)),
        }
    }

    fn event(&mut self, event: Event<'_>) -> Result<()> {
        self.writer
            .write_event(event)
            .map_err(|e| xml_error("write", e))
    }

    fn start(&mut self, name: &str) -> Result<()> {
        self.event(Event::Start(BytesStart::new(name)))
    }

    fn end(&mut self, name: &str) -> Result<()> {
        self.event(Event::End(BytesEnd::new(name)))
    }

    fn text(&mut self, name: &str, value: &str) -> Result<()> {
        self.start(name)?;
        if !value.is_empty() {
            self.event(Event::Text(BytesText::new(value)))?;
        }
        self.end(name)
    }

    fn time(&mut self, name: &str, value: &DateTime<Utc>) -> Result<()> {
        self.text(name, &format_time(value))
    }

    fn uuid(&mut self, name: &str, value: Uuid) -> Result<()> {
        self.text(name, &value.to_string())
    }

    fn into_inner(self) -> Vec<u8> {
        self.writer.into_inner()
    }
}

/// Serialize a database to XML. The returned buffer is wiped on drop.
pub fn to_xml(db: &VaultDatabase) -> Result<Zeroizing<Vec<u8>>> {
    let mut out = XmlOut::new();

    out.event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    out.start(ROOT)?;

    write_metadata(&mut out, db.metadata())?;

    out.start("Groups")?;
    for group in db.groups() {
        out.start("Group")?;
        out.uuid("UUID", group.uuid)?;
        out.text("Name", &group.name)?;
        if let Some(parent) = group.parent_uuid {
            out.uuid("ParentUUID", parent)?;
        }
        out.end("Group")?;
    }
    out.end("Groups")?;

    out.start("Entries")?;
    for entry in db.entries() {
        write_entry(&mut out, entry)?;
    }
    out.end("Entries")?;

    out.start("DeletedObjects")?;
    for deleted in db.deleted_objects() {
        out.start("DeletedObject")?;
        out.uuid("UUID", deleted.uuid)?;
        out.time("DeletionTime", &deleted.deletion_time)?;
        out.end("DeletedObject")?;
    }
    out.end("DeletedObjects")?;

    out.end(ROOT)?;
    Ok(Zeroizing::new(out.into_inner()))
}

fn write_metadata(out: &mut XmlOut, meta: &VaultMetadata) -> Result<()> {
    out.start("Meta")?;
    out.text("Version", &meta.version)?;
    out.text("Name", &meta.name)?;
    out.text("Description", &meta.description)?;
    out.text("Generator", &meta.generator)?;
    out.time("CreationTime", &meta.creation_time)?;
    out.time("LastModificationTime", &meta.last_modification_time)?;
    out.text("EntryCount", &meta.entry_count.to_string())?;
    out.text("GroupCount", &meta.group_count.to_string())?;
    out.end("Meta")
}

fn write_entry(out: &mut XmlOut, entry: &PasswordEntry) -> Result<()> {
    out.start("Entry")?;
    out.uuid("UUID", entry.uuid)?;
    out.text("Title", &entry.title)?;
    out.text("UserName", &entry.user_name)?;
    out.text("Password", &entry.password)?;
    out.text("URL", &entry.url)?;
    out.text("Notes", &entry.notes)?;

    out.start("Tags")?;
    for tag in &entry.tags {
        out.text("Tag", tag)?;
    }
    out.end("Tags")?;

    out.start("CustomFields")?;
    for field in &entry.custom_fields {
        let start = BytesStart::new("Field")
            .with_attributes([("Protected", format_bool(field.is_protected))]);
        out.event(Event::Start(start))?;
        out.text("Key", &field.key)?;
        out.text("Value", &field.value)?;
        out.end("Field")?;
    }
    out.end("CustomFields")?;

    if let Some(group) = entry.group_uuid {
        out.uuid("GroupUUID", group)?;
    }
    out.text("Favorite", format_bool(entry.is_favorite))?;
    out.text("AutoType", format_bool(entry.auto_type_enabled))?;

    let times = &entry.times;
    out.start("Times")?;
    out.time("CreationTime", &times.creation_time)?;
    out.time("LastModificationTime", &times.last_modification_time)?;
    out.time("LastAccessTime", &times.last_access_time)?;
    if let Some(expiry) = &times.expiry_time {
        out.time("ExpiryTime", expiry)?;
    }
    out.text("Expires", format_bool(times.expires))?;
    out.end("Times")?;

    out.start("History")?;
    for item in &entry.history {
        out.start("Item")?;
        out.text("Password", &item.password)?;
        out.time("ModifiedAt", &item.modified_at)?;
        out.end("Item")?;
    }
    out.end("History")?;

    out.end("Entry")
}

/// Element tree built from reader events. Text is wiped on drop.
struct Node {
    name: String,
    attributes: Vec<(String, String)>,
    text: String,
    children: Vec<Node>,
}

impl Drop for Node {
    fn drop(&mut self) {
        self.text.zeroize();
        for (_, value) in &mut self.attributes {
            value.zeroize();
        }
    }
}

impl Node {
    fn open(start: &BytesStart<'_>) -> Result<Self> {
        let name = std::str::from_utf8(start.name().as_ref())
            .map_err(|e| xml_error("parse", e))?
            .to_string();

        let mut attributes = Vec::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| xml_error("attribute", e))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr
                .unescape_value()
                .map_err(|e| xml_error("attribute", e))?
                .into_owned();
            attributes.push((key, value));
        }

        Ok(Self {
            name,
            attributes,
            text: String::new(),
            children: Vec::new(),
        })
    }

    fn child(&self, name: &str) -> Option<&Node> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn required(&self, name: &str) -> Result<&Node> {
        self.child(name).ok_or_else(|| {
            Error::Serialization(format!("<{}> is missing <{}>", self.name, name))
        })
    }

    /// Text of a child element; an absent element reads as empty.
    fn text_of(&self, name: &str) -> String {
        self.child(name).map(|c| c.text.clone()).unwrap_or_default()
    }

    fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    fn uuid_of(&self, name: &str) -> Result<Uuid> {
        parse_uuid(&self.required(name)?.text)
    }

    fn optional_uuid(&self, name: &str) -> Result<Option<Uuid>> {
        self.child(name).map(|c| parse_uuid(&c.text)).transpose()
    }

    fn time_of(&self, name: &str) -> Result<DateTime<Utc>> {
        parse_time(&self.required(name)?.text)
    }

    fn optional_time(&self, name: &str) -> Result<Option<DateTime<Utc>>> {
        self.child(name).map(|c| parse_time(&c.text)).transpose()
    }

    fn bool_of(&self, name: &str, default: bool) -> Result<bool> {
        match self.child(name) {
            Some(c) => parse_bool(&c.text),
            None => Ok(default),
        }
    }
}

fn parse_uuid(text: &str) -> Result<Uuid> {
    Uuid::parse_str(text.trim())
        .map_err(|e| Error::Serialization(format!("Invalid UUID '{}': {}", text, e)))
}

fn parse_time(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text.trim())
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| Error::Serialization(format!("Invalid timestamp '{}': {}", text, e)))
}

fn parse_bool(text: &str) -> Result<bool> {
    match text.trim() {
        "True" | "true" => Ok(true),
        "False" | "false" => Ok(false),
        other => Err(Error::Serialization(format!("Invalid boolean '{}'", other))),
    }
}

fn attach(stack: &mut [Node], root: &mut Option<Node>, node: Node) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
        Ok(())
    } else if root.is_none() {
        *root = Some(node);
        Ok(())
    } else {
        Err(Error::Serialization("Multiple root elements".to_string()))
    }
}

fn parse_tree(xml: &str) -> Result<Node> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(false);

    let mut stack: Vec<Node> = Vec::new();
    let mut root: Option<Node> = None;

    loop {
        match reader.read_event().map_err(|e| xml_error("parse", e))? {
            Event::Start(e) => stack.push(Node::open(&e)?),
            Event::Empty(e) => {
                let node = Node::open(&e)?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::End(_) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| Error::Serialization("Unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node)?;
            }
            Event::Text(e) => {
                let text = e.unescape().map_err(|e| xml_error("text", e))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Event::CData(e) => {
                let text = std::str::from_utf8(&e).map_err(|e| xml_error("CDATA", e))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(text);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(Error::Serialization("Unclosed element".to_string()));
    }
    root.ok_or_else(|| Error::Serialization("Empty document".to_string()))
}

/// Parse a database from XML.
///
/// # Errors
/// - `Serialization` for malformed XML, missing required elements or bad values
pub fn from_xml(xml: &[u8]) -> Result<VaultDatabase> {
    let xml = std::str::from_utf8(xml).map_err(|e| xml_error("encoding", e))?;
    let root = parse_tree(xml)?;
    if root.name != ROOT {
        return Err(Error::Serialization(format!(
            "Unexpected root element <{}>",
            root.name
        )));
    }

    let metadata = read_metadata(root.required("Meta")?)?;

    let groups = root
        .required("Groups")?
        .children_named("Group")
        .map(read_group)
        .collect::<Result<Vec<_>>>()?;

    let entries = root
        .required("Entries")?
        .children_named("Entry")
        .map(read_entry)
        .collect::<Result<Vec<_>>>()?;

    let deleted_objects = match root.child("DeletedObjects") {
        Some(node) => node
            .children_named("DeletedObject")
            .map(|d| {
                Ok(DeletedObject {
                    uuid: d.uuid_of("UUID")?,
                    deletion_time: d.time_of("DeletionTime")?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    VaultDatabase::from_parts(metadata, groups, entries, deleted_objects)
}

fn read_metadata(meta: &Node) -> Result<VaultMetadata> {
    Ok(VaultMetadata {
        version: meta.text_of("Version"),
        name: meta.text_of("Name"),
        description: meta.text_of("Description"),
        generator: meta.text_of("Generator"),
        creation_time: meta.time_of("CreationTime")?,
        last_modification_time: meta.time_of("LastModificationTime")?,
        // Recomputed from the lists by `from_parts`.
        entry_count: 0,
        group_count: 0,
    })
}

fn read_group(node: &Node) -> Result<Group> {
    Ok(Group {
        uuid: node.uuid_of("UUID")?,
        name: node.text_of("Name"),
        parent_uuid: node.optional_uuid("ParentUUID")?,
    })
}

fn read_entry(node: &Node) -> Result<PasswordEntry> {
    let tags = match node.child("Tags") {
        Some(tags) => tags.children_named("Tag").map(|t| t.text.clone()).collect(),
        None => Vec::new(),
    };

    let custom_fields = match node.child("CustomFields") {
        Some(fields) => fields
            .children_named("Field")
            .map(|f| {
                Ok(CustomField {
                    key: f.text_of("Key"),
                    value: f.text_of("Value"),
                    is_protected: f
                        .attribute("Protected")
                        .map(parse_bool)
                        .transpose()?
                        .unwrap_or(false),
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    let times_node = node.required("Times")?;
    let times = EntryTimes {
        creation_time: times_node.time_of("CreationTime")?,
        last_modification_time: times_node.time_of("LastModificationTime")?,
        last_access_time: times_node.time_of("LastAccessTime")?,
        expiry_time: times_node.optional_time("ExpiryTime")?,
        expires: times_node.bool_of("Expires", false)?,
    };

    let history = match node.child("History") {
        Some(history) => history
            .children_named("Item")
            .map(|item| {
                Ok(PasswordHistoryEntry {
                    password: item.text_of("Password"),
                    modified_at: item.time_of("ModifiedAt")?,
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };

    Ok(PasswordEntry {
        uuid: node.uuid_of("UUID")?,
        title: node.text_of("Title"),
        user_name: node.text_of("UserName"),
        password: node.text_of("Password"),
        url: node.text_of("URL"),
        notes: node.text_of("Notes"),
        tags,
        custom_fields,
        group_uuid: node.optional_uuid("GroupUUID")?,
        is_favorite: node.bool_of("Favorite", false)?,
        history,
        times,
        auto_type_enabled: node.bool_of("AutoType", true)?,
    })
}
