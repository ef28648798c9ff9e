//! File-reference embedding.
//!
//! Submissions reference local files by name; before a document goes on
//! the wire every reference is replaced with a `{filename: base64}`
//! object, or `null` when there is nothing to embed. The functions take
//! the document by value and return the new one, so callers see no
//! hidden mutation. Reads are blocking; run them off the protocol loop.

use std::fs;
use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Map, Value};

/// Resolve the file reference stored under `key`.
///
/// A falsy, missing or non-string value, a missing file and an unreadable
/// file all resolve to `null`; this never fails. With `delete_after` the
/// source file is removed once embedded, for one-shot uploads that must
/// not linger.
pub fn embed_key(
    folder: &Path,
    mut doc: Map<String, Value>,
    key: &str,
    delete_after: bool,
) -> Map<String, Value> {
    let resolved = resolve_reference(folder, doc.get(key), delete_after);
    doc.insert(key.to_owned(), resolved);
    doc
}

fn resolve_reference(folder: &Path, value: Option<&Value>, delete_after: bool) -> Value {
    let Some(name) = value.and_then(Value::as_str).filter(|name| !name.is_empty()) else {
        return Value::Null;
    };

    let path = folder.join(name);
    let Ok(bytes) = fs::read(&path) else {
        return Value::Null;
    };

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(name)
        .to_owned();
    let mut embedded = Map::new();
    embedded.insert(file_name, Value::String(STANDARD.encode(&bytes)));

    if delete_after {
        let _ = fs::remove_file(&path);
    }
    Value::Object(embedded)
}

/// Resolve a reference one object level down (`doc[outer][key]`).
///
/// A missing or non-object `outer` block is left untouched; an object
/// block without the key gains it as `null`.
fn embed_nested(
    folder: &Path,
    mut doc: Map<String, Value>,
    outer: &str,
    key: &str,
    delete_after: bool,
) -> Map<String, Value> {
    match doc.remove(outer) {
        Some(Value::Object(inner)) => {
            let embedded = embed_key(folder, inner, key, delete_after);
            doc.insert(outer.to_owned(), Value::Object(embedded));
        }
        Some(other) => {
            doc.insert(outer.to_owned(), other);
        }
        None => {}
    }
    doc
}

/// Embed the file references of a task submission: the target base list
/// and the mailing/auto-responder media.
pub fn embed_task_files(
    bases: &Path,
    photos: &Path,
    doc: Map<String, Value>,
) -> Map<String, Value> {
    let doc = embed_key(bases, doc, "base_file", false);
    let doc = embed_nested(photos, doc, "message_data", "media", false);
    embed_nested(photos, doc, "answer_data", "media", false)
}

/// Embed the file references of an account submission. The photo is a
/// one-shot upload and is deleted once embedded.
pub fn embed_account_files(accounts: &Path, doc: Map<String, Value>) -> Map<String, Value> {
    let doc = embed_key(accounts, doc, "session_path", false);
    embed_key(accounts, doc, "account_photo", true)
}

/// Embed the attachment of a chat message; the staged file is deleted
/// once embedded.
pub fn embed_chat_message_file(user_media: &Path, doc: Map<String, Value>) -> Map<String, Value> {
    embed_key(user_media, doc, "file_path", true)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn doc_with(key: &str, value: Value) -> Map<String, Value> {
        let mut doc = Map::new();
        doc.insert(key.to_owned(), value);
        doc
    }

    #[test]
    fn missing_file_resolves_to_null_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let doc = doc_with("base_file", json!("nowhere.txt"));
        let embedded = embed_key(dir.path(), doc, "base_file", false);
        assert_eq!(embedded.get("base_file"), Some(&json!(null)));
    }

    #[test]
    fn falsy_and_non_string_values_resolve_to_null() {
        let dir = tempfile::tempdir().unwrap();
        for value in [json!(null), json!(""), json!(false), json!(7)] {
            let doc = doc_with("base_file", value.clone());
            let embedded = embed_key(dir.path(), doc, "base_file", false);
            assert_eq!(embedded.get("base_file"), Some(&json!(null)), "for {value}");
        }
    }

    #[test]
    fn existing_file_becomes_a_named_base64_object() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("base.txt"), b"hello").unwrap();

        let doc = doc_with("base_file", json!("base.txt"));
        let embedded = embed_key(dir.path(), doc, "base_file", false);
        assert_eq!(
            embedded.get("base_file"),
            Some(&json!({"base.txt": "aGVsbG8="}))
        );
        assert!(dir.path().join("base.txt").exists());
    }

    #[test]
    fn delete_after_removes_the_source_only_when_it_existed() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("photo.jpg"), b"jpg").unwrap();

        let doc = doc_with("account_photo", json!("photo.jpg"));
        let embedded = embed_key(dir.path(), doc, "account_photo", true);
        assert!(embedded.get("account_photo").unwrap().is_object());
        assert!(!dir.path().join("photo.jpg").exists());

        // never existed: nothing to remove, nothing created
        let doc = doc_with("account_photo", json!("gone.jpg"));
        let embedded = embed_key(dir.path(), doc, "account_photo", true);
        assert_eq!(embedded.get("account_photo"), Some(&json!(null)));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn task_embedding_covers_base_and_both_media_blocks() {
        let bases = tempfile::tempdir().unwrap();
        let photos = tempfile::tempdir().unwrap();
        std::fs::write(bases.path().join("base.txt"), b"b").unwrap();
        std::fs::write(photos.path().join("m.jpg"), b"m").unwrap();

        let doc = json!({
            "base_file": "base.txt",
            "message_data": {"text_sms": {}, "media": "m.jpg"},
            "answer_data": {"variation": "II", "prompt": "текст"},
        })
        .as_object()
        .cloned()
        .unwrap();

        let embedded = embed_task_files(bases.path(), photos.path(), doc);
        assert!(embedded.get("base_file").unwrap().is_object());
        assert_eq!(
            embedded["message_data"]["media"],
            json!({"m.jpg": "bQ=="})
        );
        // an answer block without media tolerates the absence
        assert_eq!(embedded["answer_data"]["media"], json!(null));
        assert_eq!(embedded["answer_data"]["prompt"], json!("текст"));
    }

    #[test]
    fn account_embedding_keeps_session_and_deletes_photo() {
        let accounts = tempfile::tempdir().unwrap();
        std::fs::write(accounts.path().join("a.session"), b"s").unwrap();
        std::fs::write(accounts.path().join("a.jpg"), b"p").unwrap();

        let doc = json!({"session_path": "a.session", "account_photo": "a.jpg"})
            .as_object()
            .cloned()
            .unwrap();
        let embedded = embed_account_files(accounts.path(), doc);
        assert!(embedded["session_path"].is_object());
        assert!(embedded["account_photo"].is_object());
        assert!(accounts.path().join("a.session").exists());
        assert!(!accounts.path().join("a.jpg").exists());
    }
}
