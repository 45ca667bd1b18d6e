//! Document assembly: fragment PDFs → one multi-page PDF, last letter first.
//!
//! Every fragment is a single-page PDF. The assembler copies the first page of
//! each into a growing output document, walking the tokens **in reverse**, so
//! `ab` comes out as page(b), page(a). The reversal is part of the output's
//! look and must not be "fixed".
//!
//! ## Copying a page with lopdf
//!
//! A page is a dictionary pointing at content streams, fonts and images. To
//! graft it into another document, [`PdfPageWriter`] renumbers every object of
//! the fragment past the output's highest id, copies them across, and drops
//! the fragment's own catalog and page tree. Attributes a page may inherit
//! from its page tree (`Resources`, `MediaBox`, `CropBox`, `Rotate`) are
//! copied onto the page first, since that tree is discarded. [`finish`]
//! builds a fresh page tree and catalog over the collected pages.
//!
//! [`finish`]: DocumentWriter::finish

use crate::error::CryptextError;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};

/// Page attributes that may be inherited from an ancestor `Pages` node.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// PDF version written for assembled documents.
const OUTPUT_VERSION: &str = "1.5";

/// A growing multi-page document.
pub trait DocumentWriter {
    /// Parse `source` as a PDF and append its first page.
    ///
    /// `fragment_id` is only used to label errors.
    fn append_first_page(&mut self, fragment_id: &str, source: &[u8]) -> Result<(), CryptextError>;

    /// Pages appended so far.
    fn page_count(&self) -> usize;

    /// Serialise the document.
    fn finish(self) -> Result<Vec<u8>, CryptextError>;
}

/// [`DocumentWriter`] backed by `lopdf`.
pub struct PdfPageWriter {
    document: Document,
    pages: Vec<ObjectId>,
}

impl PdfPageWriter {
    pub fn new() -> Self {
        Self {
            document: Document::with_version(OUTPUT_VERSION),
            pages: Vec::new(),
        }
    }
}

impl Default for PdfPageWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentWriter for PdfPageWriter {
    fn append_first_page(&mut self, fragment_id: &str, source: &[u8]) -> Result<(), CryptextError> {
        let fail = |detail: String| CryptextError::AssemblyFailed {
            fragment_id: fragment_id.to_string(),
            detail,
        };

        let mut fragment = Document::load_mem(source).map_err(|e| fail(format!("{e}")))?;
        fragment.renumber_objects_with(self.document.max_id + 1);

        let page_id = fragment
            .get_pages()
            .values()
            .next()
            .copied()
            .ok_or_else(|| fail("document has no pages".into()))?;

        let inherited = inherited_attributes(&fragment, page_id);
        let top_id = fragment
            .objects
            .keys()
            .map(|(id, _)| *id)
            .max()
            .unwrap_or(0)
            .max(fragment.max_id);

        for (id, object) in std::mem::take(&mut fragment.objects) {
            match dict_type(&object) {
                Some(b"Catalog") | Some(b"Pages") => continue,
                Some(b"Page") if id != page_id => continue,
                _ => {}
            }
            self.document.objects.insert(id, object);
        }

        let page = self
            .document
            .objects
            .get_mut(&page_id)
            .and_then(|o| o.as_dict_mut().ok())
            .ok_or_else(|| fail(format!("page object {page_id:?} is not a dictionary")))?;
        for (key, value) in inherited {
            page.set(key, value);
        }

        self.document.max_id = self.document.max_id.max(top_id);
        self.pages.push(page_id);
        Ok(())
    }

    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn finish(mut self) -> Result<Vec<u8>, CryptextError> {
        let pages_id = self.document.new_object_id();

        for page_id in &self.pages {
            if let Some(Ok(page)) = self
                .document
                .objects
                .get_mut(page_id)
                .map(|o| o.as_dict_mut())
            {
                page.set("Parent", pages_id);
            }
        }

        let kids: Vec<Object> = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        self.document.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => Object::Integer(self.pages.len() as i64),
            }),
        );

        let catalog_id = self.document.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        self.document.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        self.document
            .save_to(&mut buf)
            .map_err(|e| CryptextError::Internal(format!("PDF serialisation failed: {e}")))?;
        Ok(buf)
    }
}

/// The `/Type` name of a dictionary or stream object.
fn dict_type(object: &Object) -> Option<&[u8]> {
    let dict = match object {
        Object::Dictionary(d) => d,
        Object::Stream(s) => &s.dict,
        _ => return None,
    };
    dict.get(b"Type").and_then(Object::as_name).ok()
}

/// Inheritable attributes the page lacks but an ancestor defines.
fn inherited_attributes(document: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let Ok(page) = document.get_dictionary(page_id) else {
        return Vec::new();
    };

    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut node: &Dictionary = page;

    // Bounded walk: malformed files can contain parent cycles.
    for _ in 0..32 {
        if missing.is_empty() {
            break;
        }
        let Some(parent) = node
            .get(b"Parent")
            .and_then(Object::as_reference)
            .ok()
            .and_then(|id| document.get_dictionary(id).ok())
        else {
            break;
        };
        missing.retain(|key| match parent.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        node = parent;
    }
    found
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::Stream;

    /// A one-page PDF whose content stream shows `label`.
    ///
    /// With `inherit_media_box`, the page takes its MediaBox from the page
    /// tree rather than defining it itself.
    fn fixture_pdf(label: &str, inherit_media_box: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let content = format!("BT /F1 48 Tf 100 400 Td ({label}) Tj ET");
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let media_box: Vec<Object> = vec![0.into(), 0.into(), 595.into(), 842.into()];

        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        let mut pages = dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::Reference((0, 0))],
            "Count" => 1,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        };
        if inherit_media_box {
            pages.set("MediaBox", media_box);
        } else {
            page.set("MediaBox", media_box);
        }

        let page_id = doc.add_object(page);
        pages.set("Kids", vec![Object::Reference(page_id)]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut buf = Vec::new();
        doc.save_to(&mut buf).expect("fixture serialises");
        buf
    }

    /// The content stream of every page, in page order.
    fn page_contents(pdf: &[u8]) -> Vec<String> {
        let doc = Document::load_mem(pdf).expect("output parses");
        doc.get_pages()
            .values()
            .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
            .collect()
    }

    #[test]
    fn appends_pages_in_call_order() {
        let mut writer = PdfPageWriter::new();
        writer.append_first_page("F_b", &fixture_pdf("b", false)).unwrap();
        writer.append_first_page("F_a", &fixture_pdf("a", false)).unwrap();
        assert_eq!(writer.page_count(), 2);

        let contents = page_contents(&writer.finish().unwrap());
        assert_eq!(contents.len(), 2);
        assert!(contents[0].contains("(b)"));
        assert!(contents[1].contains("(a)"));
    }

    #[test]
    fn same_fragment_can_be_appended_twice() {
        let bytes = fixture_pdf("o", false);
        let mut writer = PdfPageWriter::new();
        writer.append_first_page("F_o", &bytes).unwrap();
        writer.append_first_page("F_o", &bytes).unwrap();

        let contents = page_contents(&writer.finish().unwrap());
        assert_eq!(contents.len(), 2);
        assert!(contents.iter().all(|c| c.contains("(o)")));
    }

    #[test]
    fn inherited_attributes_are_copied_onto_the_page() {
        let mut writer = PdfPageWriter::new();
        writer.append_first_page("F_x", &fixture_pdf("x", true)).unwrap();
        let out = writer.finish().unwrap();

        let doc = Document::load_mem(&out).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
    }

    #[test]
    fn garbage_is_an_assembly_failure() {
        let mut writer = PdfPageWriter::new();
        let err = writer
            .append_first_page("F_bad", b"%PDF-1.5 this is not really a pdf")
            .unwrap_err();
        match err {
            CryptextError::AssemblyFailed { fragment_id, .. } => assert_eq!(fragment_id, "F_bad"),
            other => panic!("expected AssemblyFailed, got {other:?}"),
        }
        assert_eq!(writer.page_count(), 0);
    }

    #[test]
    fn empty_writer_produces_a_valid_empty_document() {
        let out = PdfPageWriter::new().finish().unwrap();
        assert!(out.starts_with(b"%PDF"));
        assert!(page_contents(&out).is_empty());
    }
}
