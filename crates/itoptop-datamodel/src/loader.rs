//! Data-dictionary XML loader.
//!
//! Reads an iTop `datamodel` export into a [`DataModelDocument`]:
//!
//! ```xml
//! <itop_design xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
//!   <classes>
//!     <class id="Organization">
//!       <parent>cmdbAbstractObject</parent>
//!       <fields>
//!         <field id="parent_id" xsi:type="AttributeHierarchicalKey"/>
//!         <field id="parent_name" xsi:type="AttributeExternalField">
//!           <extkey_attcode>parent_id</extkey_attcode>
//!           <target_attcode>name</target_attcode>
//!         </field>
//!       </fields>
//!     </class>
//!   </classes>
//! </itop_design>
//! ```
//!
//! Names are matched by local name, so namespace prefixes (`xsi:type`) and
//! `xmlns` declarations need no preprocessing. Every `field` in a class's
//! subtree belongs to that class, including fields of nested classes.

use crate::document::{ClassNode, DataModelDocument, FieldNode};
use crate::error::LoadError;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::path::Path;

/// Read and parse an export. Invalid UTF-8 is replaced rather than rejected.
pub fn load_path(path: impl AsRef<Path>) -> Result<DataModelDocument, LoadError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let document = load_str(&text)?;
    tracing::info!(
        path = %path.display(),
        classes = document.classes.len(),
        "loaded data model"
    );
    Ok(document)
}

pub fn load_str(xml: &str) -> Result<DataModelDocument, LoadError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut builder = Builder::default();
    loop {
        let position = reader.buffer_position();
        let xml_err = |source: quick_xml::Error| LoadError::Xml { position, source };

        match reader.read_event().map_err(xml_err)? {
            Event::Start(e) => builder.open(&e).map_err(xml_err)?,
            Event::Empty(e) => {
                builder.open(&e).map_err(xml_err)?;
                builder.close();
            }
            Event::End(_) => builder.close(),
            Event::Text(t) => builder.text(&t.unescape().map_err(xml_err)?),
            Event::CData(c) => builder.text(&String::from_utf8_lossy(&c.into_inner())),
            Event::Eof => break,
            _ => {}
        }
    }

    if builder.depth != 0 {
        return Err(LoadError::UnbalancedDocument {
            open: builder.depth,
        });
    }

    let fields: usize = builder.classes.iter().map(|c| c.fields.len()).sum();
    tracing::debug!(
        classes = builder.classes.len(),
        fields,
        "parsed data model document"
    );
    Ok(DataModelDocument::new(builder.classes))
}

// ============================================================================
// Tree builder
// ============================================================================

#[derive(Debug)]
enum CaptureTarget {
    FieldChild(String),
    Parent,
}

#[derive(Debug)]
struct Capture {
    target: CaptureTarget,
    depth: usize,
    text: String,
}

#[derive(Debug)]
struct OpenField {
    /// `None` when the element has no `id`; its subtree is skipped.
    node: Option<FieldNode>,
    depth: usize,
}

#[derive(Debug, Default)]
struct Builder {
    classes: Vec<ClassNode>,
    /// (index into `classes`, element depth) of every enclosing class.
    class_stack: Vec<(usize, usize)>,
    field: Option<OpenField>,
    capture: Option<Capture>,
    depth: usize,
}

impl Builder {
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), quick_xml::Error> {
        self.depth += 1;
        let name = e.local_name();

        if let Some(field) = &self.field {
            if self.depth == field.depth + 1 && self.capture.is_none() {
                self.capture = Some(Capture {
                    target: CaptureTarget::FieldChild(
                        String::from_utf8_lossy(name.as_ref()).into_owned(),
                    ),
                    depth: self.depth,
                    text: String::new(),
                });
            }
            return Ok(());
        }

        match name.as_ref() {
            b"class" => {
                let class = ClassNode {
                    id: attribute(e, b"id")?,
                    ..ClassNode::default()
                };
                self.classes.push(class);
                self.class_stack.push((self.classes.len() - 1, self.depth));
            }
            b"field" if !self.class_stack.is_empty() => {
                let node = match attribute(e, b"id")? {
                    Some(id) => Some(FieldNode {
                        id,
                        field_type: attribute(e, b"type")?,
                        children: Default::default(),
                    }),
                    None => None,
                };
                self.field = Some(OpenField {
                    node,
                    depth: self.depth,
                });
            }
            b"parent" => {
                if let Some(&(_, class_depth)) = self.class_stack.last() {
                    if self.depth == class_depth + 1 {
                        self.capture = Some(Capture {
                            target: CaptureTarget::Parent,
                            depth: self.depth,
                            text: String::new(),
                        });
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn text(&mut self, text: &str) {
        if let Some(capture) = &mut self.capture {
            if capture.depth == self.depth {
                capture.text.push_str(text);
            }
        }
    }

    fn close(&mut self) {
        if self.capture.as_ref().is_some_and(|c| c.depth == self.depth) {
            if let Some(capture) = self.capture.take() {
                self.finish_capture(capture);
            }
        }

        if self.field.as_ref().is_some_and(|f| f.depth == self.depth) {
            if let Some(OpenField {
                node: Some(node), ..
            }) = self.field.take()
            {
                self.attach_field(node);
            }
        }

        if self
            .class_stack
            .last()
            .is_some_and(|&(_, depth)| depth == self.depth)
        {
            self.class_stack.pop();
        }

        self.depth = self.depth.saturating_sub(1);
    }

    fn finish_capture(&mut self, capture: Capture) {
        let value = capture.text.trim().to_string();
        match capture.target {
            CaptureTarget::FieldChild(name) => {
                if let Some(OpenField {
                    node: Some(node), ..
                }) = &mut self.field
                {
                    node.children.entry(name).or_insert(value);
                }
            }
            CaptureTarget::Parent => {
                if let Some(&(idx, _)) = self.class_stack.last() {
                    let class = &mut self.classes[idx];
                    if class.parent.is_none() && !value.is_empty() {
                        class.parent = Some(value);
                    }
                }
            }
        }
    }

    /// A field belongs to every class whose subtree contains it.
    fn attach_field(&mut self, node: FieldNode) {
        for &(idx, _) in &self.class_stack {
            self.classes[idx].fields.push(node.clone());
        }
    }
}

fn attribute(e: &BytesStart<'_>, local: &[u8]) -> Result<Option<String>, quick_xml::Error> {
    for attr in e.attributes() {
        let attr = attr?;
        if attr.key.local_name().as_ref() == local {
            return Ok(Some(attr.unescape_value()?.into_owned()));
        }
    }
    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<itop_design xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" version="1.7">
  <classes>
    <class id="Organization" _delta="define">
      <parent>cmdbAbstractObject</parent>
      <properties>
        <category>bizmodel,searchable</category>
      </properties>
      <fields>
        <field id="name" xsi:type="AttributeString">
          <sql>name</sql>
        </field>
        <field id="parent_id" xsi:type="AttributeHierarchicalKey">
          <sql>parent_id</sql>
        </field>
        <field id="parent_name" xsi:type="AttributeExternalField">
          <extkey_attcode>parent_id</extkey_attcode>
          <target_attcode> name </target_attcode>
        </field>
        <field xsi:type="AttributeString"/>
      </fields>
    </class>
    <class>
      <fields>
        <field id="orphan" xsi:type="AttributeString"/>
      </fields>
    </class>
  </classes>
</itop_design>
"#;

    #[test]
    fn test_load_strips_namespaces_and_reads_children() {
        let doc = load_str(SAMPLE).unwrap();
        assert_eq!(doc.classes.len(), 2);

        let org = &doc.classes[0];
        assert_eq!(org.id.as_deref(), Some("Organization"));
        assert_eq!(org.parent.as_deref(), Some("cmdbAbstractObject"));
        assert_eq!(org.fields.len(), 3);

        let ext = &org.fields[2];
        assert_eq!(ext.id, "parent_name");
        assert_eq!(ext.field_type.as_deref(), Some("AttributeExternalField"));
        assert_eq!(ext.child("extkey_attcode"), Some("parent_id"));
        assert_eq!(ext.child("target_attcode"), Some("name"));

        assert_eq!(doc.classes[1].id, None);
        assert_eq!(doc.classes[1].fields.len(), 1);
    }

    #[test]
    fn test_nested_class_fields_belong_to_both_classes() {
        let xml = r#"<classes>
  <class id="Contact">
    <fields><field id="name" type="AttributeString"/></fields>
    <class id="Person">
      <parent>Contact</parent>
      <fields><field id="first_name" type="AttributeString"/></fields>
    </class>
  </class>
</classes>"#;
        let doc = load_str(xml).unwrap();
        let ids = |i: usize| {
            doc.classes[i]
                .fields
                .iter()
                .map(|f| f.id.clone())
                .collect::<Vec<_>>()
        };

        assert_eq!(doc.classes[0].id.as_deref(), Some("Contact"));
        assert_eq!(doc.classes[0].parent, None);
        assert_eq!(ids(0), vec!["name", "first_name"]);
        assert_eq!(doc.classes[1].parent.as_deref(), Some("Contact"));
        assert_eq!(ids(1), vec!["first_name"]);
    }

    #[test]
    fn test_parent_inside_field_is_not_class_parent() {
        let xml = r#"<class id="A"><fields>
  <field id="f" type="X"><parent>B</parent></field>
</fields></class>"#;
        let doc = load_str(xml).unwrap();
        assert_eq!(doc.classes[0].parent, None);
        assert_eq!(doc.classes[0].fields[0].child("parent"), Some("B"));
    }

    #[test]
    fn test_unbalanced_document_is_an_error() {
        let err = load_str("<classes><class id=\"A\">").unwrap_err();
        assert!(matches!(
            err,
            LoadError::UnbalancedDocument { open: 2 } | LoadError::Xml { .. }
        ));
    }

    #[test]
    fn test_mismatched_tags_are_an_xml_error() {
        let err = load_str("<classes><class id=\"A\"></classes>").unwrap_err();
        assert!(matches!(err, LoadError::Xml { .. }));
    }

    #[test]
    fn test_empty_child_element_reads_as_missing() {
        let xml = r#"<class id="Organization">
  <fields>
    <field id="parent_id" xsi:type="AttributeHierarchicalKey"/>
    <field id="parent_name" xsi:type="AttributeExternalField">
      <extkey_attcode>parent_id</extkey_attcode>
      <target_attcode/>
    </field>
  </fields>
</class>"#;
        let doc = load_str(xml).unwrap();
        let field = &doc.classes[0].fields[1];
        assert_eq!(field.children.get("target_attcode").map(String::as_str), Some(""));
        assert_eq!(field.child("target_attcode"), None);

        let err = crate::DataModel::new(doc)
            .resolve_external_fields("Organization")
            .unwrap_err();
        assert_eq!(
            err,
            crate::ResolveError::malformed(
                "Organization",
                "parent_name",
                crate::Malformation::MissingChild("target_attcode")
            )
        );
    }

    #[test]
    fn test_cdata_child_text() {
        let xml = r#"<class id="Ticket">
  <parent><![CDATA[cmdbAbstractObject]]></parent>
  <fields>
    <field id="contacts_list" xsi:type="AttributeLinkedSetIndirect">
      <linked_class><![CDATA[lnkContactToTicket]]></linked_class>
      <ext_key_to_me>ticket<![CDATA[_id]]></ext_key_to_me>
    </field>
  </fields>
</class>"#;
        let doc = load_str(xml).unwrap();
        let class = &doc.classes[0];
        assert_eq!(class.parent.as_deref(), Some("cmdbAbstractObject"));
        assert_eq!(class.fields[0].child("linked_class"), Some("lnkContactToTicket"));
        assert_eq!(class.fields[0].child("ext_key_to_me"), Some("ticket_id"));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = load_path("/definitely/not/here/datamodel.xml").unwrap_err();
        assert!(matches!(err, LoadError::Io { .. }));
    }
}
