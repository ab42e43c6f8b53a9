//! Synthetic PDFs for tests and benchmarks.
//!
//! Unit tests reach this module as `crate::testutil`; integration tests and
//! benches include the same file by path so every test builds its PDFs the
//! same way.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};

/// Build a PDF with `page_count` pages, each showing "Page N".
///
/// Pages sit directly under the root page tree node and inherit its
/// resources and media box.
pub fn sample_pdf(page_count: u32) -> Vec<u8> {
    let (mut doc, pages_id) = start();
    let kids: Vec<Object> = (1..=page_count)
        .map(|page| add_page(&mut doc, pages_id, page).into())
        .collect();
    finish(doc, pages_id, kids, page_count)
}

/// Build a PDF whose pages hang off intermediate `Pages` nodes holding at
/// most `leaf_size` pages each.
///
/// The intermediate nodes carry `/Rotate 90`; pages set no attributes of
/// their own, so rotation, resources and media box are all inherited.
pub fn tree_pdf(page_count: u32, leaf_size: u32) -> Vec<u8> {
    let leaf_size = leaf_size.max(1);
    let (mut doc, pages_id) = start();

    let mut kids: Vec<Object> = Vec::new();
    let mut first = 1;
    while first <= page_count {
        let last = first.saturating_add(leaf_size - 1).min(page_count);
        let node_id = doc.new_object_id();
        let leaves: Vec<Object> = (first..=last)
            .map(|page| add_page(&mut doc, node_id, page).into())
            .collect();
        doc.objects.insert(
            node_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Parent" => pages_id,
                "Kids" => leaves,
                "Count" => (last - first + 1) as i64,
                "Rotate" => 90,
            }),
        );
        kids.push(node_id.into());
        if last == page_count {
            break;
        }
        first = last + 1;
    }

    finish(doc, pages_id, kids, page_count)
}

/// Build a structurally valid PDF whose page tree is empty.
pub fn empty_pdf() -> Vec<u8> {
    let (doc, pages_id) = start();
    finish(doc, pages_id, Vec::new(), 0)
}

/// Build a two-page PDF that declares standard security in its trailer.
pub fn encrypted_pdf() -> Vec<u8> {
    let mut doc = Document::load_mem(&sample_pdf(2)).unwrap();
    let encrypt_id = doc.add_object(dictionary! {
        "Filter" => "Standard",
        "V" => 1,
        "R" => 2,
        "O" => Object::string_literal(vec![0u8; 32]),
        "U" => Object::string_literal(vec![0u8; 32]),
        "P" => -4,
    });
    doc.trailer.set("Encrypt", encrypt_id);
    save(doc)
}

/// Decoded content streams of every page of a PDF, in page order.
pub fn page_contents(data: &[u8]) -> Vec<String> {
    let doc = Document::load_mem(data).unwrap();
    doc.get_pages()
        .values()
        .map(|id| String::from_utf8_lossy(&doc.get_page_content(*id).unwrap()).into_owned())
        .collect()
}

fn start() -> (Document, ObjectId) {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    (doc, pages_id)
}

fn add_page(doc: &mut Document, parent: ObjectId, page: u32) -> ObjectId {
    let content = Content {
        operations: vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 18.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
            Operation::new("Tj", vec![Object::string_literal(format!("Page {}", page))]),
            Operation::new("ET", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
    doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    })
}

fn finish(mut doc: Document, pages_id: ObjectId, kids: Vec<Object>, page_count: u32) -> Vec<u8> {
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    save(doc)
}

fn save(mut doc: Document) -> Vec<u8> {
    let mut data = Vec::new();
    doc.save_to(&mut data).unwrap();
    data
}
