//! Fixtures shared by the unit tests, the integration tests and the CLI tests.
//!
//! PDFs are generated on the fly with lopdf so no binary fixtures live in
//! the repository.

use lopdf::content::{Content, Operation};
use lopdf::{
    Document, EncryptionState, EncryptionVersion, Object, Permissions, Stream, StringFormat,
    dictionary,
};
use std::path::{Path, PathBuf};

/// Write a valid PDF with `pages` pages whose content streams are stored
/// uncompressed and an unreferenced object, so a structural rewrite can
/// always shrink it.
pub fn write_test_pdf(dir: &Path, name: &str, pages: u32) -> PathBuf {
    let path = dir.join(name);
    test_document(pages).save(&path).expect("save test pdf");
    path
}

/// Write a PDF encrypted with owner password `owner` and the given user
/// password. An empty `user_password` opens without prompting.
pub fn write_encrypted_pdf(dir: &Path, name: &str, pages: u32, user_password: &str) -> PathBuf {
    let mut doc = test_document(pages);
    doc.trailer.set(
        "ID",
        Object::Array(vec![
            Object::String(b"pdfsmith-fixture".to_vec(), StringFormat::Literal),
            Object::String(b"pdfsmith-fixture".to_vec(), StringFormat::Literal),
        ]),
    );

    let version = EncryptionVersion::V2 {
        document: &doc,
        owner_password: "owner",
        user_password,
        key_length: 128,
        permissions: Permissions::all(),
    };
    let state = EncryptionState::try_from(version).expect("encryption state");
    doc.encrypt(&state).expect("encrypt test pdf");

    let path = dir.join(name);
    doc.save(&path).expect("save encrypted pdf");
    path
}

/// Page count of a PDF on disk.
pub fn page_count(path: &Path) -> usize {
    Document::load(path).expect("load pdf").get_pages().len()
}

/// First text line drawn on each page, e.g. `"Page 0 line 0"`.
pub fn page_labels(path: &Path) -> Vec<String> {
    let doc = Document::load(path).expect("load pdf");
    doc.get_pages()
        .values()
        .map(|&page_id| {
            let content = doc.get_page_content(page_id).expect("page content");
            let text = String::from_utf8_lossy(&content).into_owned();
            text.find("(Page ")
                .and_then(|start| {
                    let label = &text[start + 1..];
                    label.find(" line").map(|end| label[..end].to_string())
                })
                .unwrap_or_default()
        })
        .collect()
}

fn test_document(pages: u32) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for page in 0..pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 10.into()]),
        ];
        for line in 0..60 {
            operations.push(Operation::new("Td", vec![0.into(), (-12).into()]));
            operations.push(Operation::new(
                "Tj",
                vec![Object::string_literal(format!(
                    "Page {page} line {line}: the quick brown fox jumps over the lazy dog"
                ))],
            ));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(
            dictionary! {},
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => pages as i64,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    // Never referenced; pruning removes it.
    doc.add_object(Stream::new(dictionary! {}, vec![b'x'; 4096]));

    doc
}

/// Write a file that looks like a PDF by extension but cannot be parsed.
pub fn write_corrupt_pdf(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog\ngarbage without end\n")
        .expect("write corrupt pdf");
    path
}

/// Write an executable shell script standing in for Ghostscript.
///
/// The script exposes `$out` (the `-sOutputFile=` value) and `$in` (the last
/// argument) to `body`.
#[cfg(unix)]
pub fn fake_ghostscript(dir: &Path, name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let script = format!(
        "#!/bin/sh\n\
         out=\"\"\n\
         for arg in \"$@\"; do\n\
         \x20 case \"$arg\" in\n\
         \x20   -sOutputFile=*) out=\"${{arg#-sOutputFile=}}\" ;;\n\
         \x20 esac\n\
         \x20 in=\"$arg\"\n\
         done\n\
         {body}\n"
    );

    let path = dir.join(name);
    std::fs::write(&path, script).expect("write fake ghostscript");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("chmod fake ghostscript");
    path
}
