//! Task-submission validation.
//!
//! The raw input is the flat union of the task form document and the
//! nested settings document. Validation checks it field by field, builds
//! the derived `message_data`/`answer_data`/`channel_data` blocks, stamps
//! a fresh id and returns the result as an immutable [`TaskConfig`].
//! Nothing is sent unless every rule passes.

use std::collections::HashSet;

use rand::Rng;
use serde_json::{Map, Value, json};

use crate::document;
use crate::error::CoreError;

/// Named delay ranges the settings document must define, each with
/// `min`/`max` bounds.
pub const DELAY_RANGE_KEYS: [&str; 13] = [
    "prof_uniq",
    "pars_chat",
    "send_msg_user",
    "send_msg_chat",
    "invite",
    "read_history",
    "error_delay_entity",
    "auto_responder_static",
    "auto_responder_II",
    "after_launch",
    "between_steps",
    "peerflooderror",
    "work_acc",
];

/// Nested settings paths a submission depends on.
const REQUIRED_SETTINGS_PATHS: [&[&str]; 6] = [
    &["const", "system_version"],
    &["settings_mailing_chats", "repeats"],
    &["settings_mailing_chats", "wait_msg_chats"],
    &["settings_II", "prompt"],
    &["settings_dilay_mailing_to_target", "user"],
    &["settings_dilay_mailing_to_target", "chat"],
];

/// UI-only placeholder-image keys, stripped before submission.
const PLACEHOLDER_FILE_KEYS: [&str; 3] = ["default_file", "no_doc_file", "yes_doc_file"];

/// A validated, fully resolved task submission.
///
/// Immutable once built; consumed by the outbound channel after file
/// embedding and not retained by the client.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskConfig(Map<String, Value>);

impl TaskConfig {
    /// Submission id assigned at validation time.
    pub fn id(&self) -> &str {
        self.0
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_path(&self, keys: &[&str]) -> Option<&Value> {
        document::get_path(&self.0, keys)
    }

    pub fn list_accounts(&self) -> &[Value] {
        self.0
            .get("list_accounts")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Hand the document over for file embedding and sending.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

/// Validate a raw submission document. See the module docs for the rule
/// set; the first violated rule aborts with its user-facing description.
pub fn validate_task_config(mut doc: Map<String, Value>) -> Result<TaskConfig, CoreError> {
    dedup_accounts(&mut doc)?;

    let answer_data = build_answer_data(&doc)?;
    doc.insert("answer_data".to_owned(), answer_data);

    present(&doc, "variation_target", "Небыл выбран чекбокс с выриантном целей для рассылки")?;
    present(&doc, "variation_base", "Небыл выбран чекбокс с типом базы")?;
    present(&doc, "base_file", "Небыл добавлен файл с базой по которой будем работать")?;
    present(&doc, "uniq_profile", "Нет данных выбора унакализировать аккаунт или нет")?;
    present(&doc, "slow_mode", "Нет данных выбора слоу мода")?;
    present(&doc, "clear_history_base", "Нет данных по очистки истории общения для нейронки")?;

    build_mailing_data(&mut doc)?;
    check_delay_settings(&doc)?;
    check_container_shapes(&doc)?;

    for path in REQUIRED_SETTINGS_PATHS {
        if document::get_path(&doc, path).is_none() {
            return Err(CoreError::SettingsData(format!(
                "в настройках нет ключа {}",
                path.join(".")
            )));
        }
    }

    let id = rand::rng().random_range(100_000..=999_999);
    doc.insert("id".to_owned(), Value::String(id.to_string()));
    for key in PLACEHOLDER_FILE_KEYS {
        doc.remove(key);
    }

    Ok(TaskConfig(doc))
}

/// `list_accounts` must be a non-empty list; duplicates are dropped
/// keeping the first occurrence, so re-validating is a no-op.
fn dedup_accounts(doc: &mut Map<String, Value>) -> Result<(), CoreError> {
    let accounts = match doc.get("list_accounts") {
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        _ => {
            return Err(CoreError::ConfigData(
                "Cписок с аккаунта по который должны выполняться работа пуст".to_owned(),
            ));
        }
    };

    let mut seen = HashSet::new();
    let mut deduped = Vec::with_capacity(accounts.len());
    for account in accounts {
        if seen.insert(account.to_string()) {
            deduped.push(account);
        }
    }
    doc.insert("list_accounts".to_owned(), Value::Array(deduped));
    Ok(())
}

fn build_answer_data(doc: &Map<String, Value>) -> Result<Value, CoreError> {
    let variation = present(doc, "variation_answer", "Нет данных о варианте способа ответа")?
        .as_i64()
        .ok_or_else(|| {
            CoreError::ConfigData("Нет данных о варианте способа ответа".to_owned())
        })?;

    match variation {
        0 => {
            present(doc, "answer_static_text_content", "Нет данных о тексте для ответов")?;
            present(doc, "answer_media_file", "Нет данных о медиафайле для ответов")?;
            Ok(json!({
                "variation": "static",
                "text_sms": {
                    "text": {
                        "default": optional(doc, "answer_static_text_content"),
                        "lang": optional(doc, "answer_static_lang_content"),
                    },
                    "language_matching": optional(doc, "translate_fio"),
                    "neuro_mod": false,
                },
                "media": media_or_placeholder(doc, "answer_media_file"),
            }))
        }
        1 => {
            present(doc, "prompt_text_content", "Нет данных о Промпте")?;
            Ok(json!({
                "variation": "II",
                "prompt": optional(doc, "prompt_text_content"),
            }))
        }
        2 => Ok(json!({"variation": "dynamic"})),
        3 => Ok(json!({"variation": null})),
        _ => Err(CoreError::ConfigData(
            "Неизвестный вариант способа ответа".to_owned(),
        )),
    }
}

fn build_mailing_data(doc: &mut Map<String, Value>) -> Result<(), CoreError> {
    let variation = present(doc, "variation_mailing", "Нет данных о варианте способа рассылки")?
        .as_i64()
        .ok_or_else(|| {
            CoreError::ConfigData("Нет данных о варианте способа рассылки".to_owned())
        })?;

    match variation {
        0 => {
            doc.insert("channel_data".to_owned(), Value::Null);

            present(doc, "static_text_content", "Небыл введен текст для рассылки от своего лица")?;
            present(doc, "mailing_media_file", "Небыл выбран медиафайл для рассылки от своего лица")?;
            let message_data = json!({
                "text_sms": {
                    "text": {
                        "default": optional(doc, "static_text_content"),
                        "lang": optional(doc, "static_lang_content"),
                    },
                    "language_matching": optional(doc, "translate_fio"),
                    "neuro_mod": false,
                },
                "media": media_or_placeholder(doc, "mailing_media_file"),
            });
            doc.insert("message_data".to_owned(), message_data);
        }
        1 => {
            present(doc, "channel_title", "Небыл введен Загаловок канала")?;
            present(doc, "channel_description", "Небыло введено Описание канала")?;
            present(doc, "channel_btn_text", "Небыло введено Название Кнопки")?;
            present(doc, "channel_btn_url", "Небыл введен URL для Кнопки")?;
            let channel_data = json!({
                "title": optional(doc, "channel_title"),
                "description": optional(doc, "channel_description"),
                "text": optional(doc, "channel_btn_text"),
                "link": optional(doc, "channel_btn_url"),
            });
            doc.insert("channel_data".to_owned(), channel_data);

            present(doc, "channel_text_content", "Небыл введен текст для рассылки через канал")?;
            present(doc, "mailing_media_file", "Небыл выбран медиафайл для рассылки через канал")?;
            let message_data = json!({
                "text_sms": {
                    "text": {
                        "default": optional(doc, "channel_text_content"),
                        "lang": null,
                    },
                    "language_matching": null,
                    "neuro_mod": false,
                },
                "media": media_or_placeholder(doc, "mailing_media_file"),
            });
            doc.insert("message_data".to_owned(), message_data);
        }
        _ => {
            return Err(CoreError::ConfigData(
                "Неизвестный вариант способа рассылки".to_owned(),
            ));
        }
    }
    Ok(())
}

fn check_delay_settings(doc: &Map<String, Value>) -> Result<(), CoreError> {
    let time_dilay = match doc.get("time_dilay") {
        Some(value) if !value.is_null() => value,
        _ => {
            return Err(CoreError::SettingsData(
                "Настроек с задержками нет".to_owned(),
            ));
        }
    };

    for range in DELAY_RANGE_KEYS {
        for bound in ["min", "max"] {
            if time_dilay.get(range).and_then(|r| r.get(bound)).is_none() {
                return Err(CoreError::SettingsData(format!(
                    "в настройках задержек нет ключа {range}.{bound}"
                )));
            }
        }
    }

    let sleep_blocks = time_dilay
        .get("sleep_blocks")
        .and_then(Value::as_array)
        .ok_or_else(|| {
            CoreError::SettingsData("sleep_blocks не является списком".to_owned())
        })?;
    for block in sleep_blocks {
        if !block.get("start").is_some_and(document::is_truthy) {
            return Err(CoreError::SettingsData("у sleep_block нет начала".to_owned()));
        }
        if !block.get("end").is_some_and(document::is_truthy) {
            return Err(CoreError::SettingsData("у sleep_block нет конца".to_owned()));
        }
    }
    Ok(())
}

fn check_container_shapes(doc: &Map<String, Value>) -> Result<(), CoreError> {
    if !doc.get("pars_users").is_some_and(Value::is_object) {
        return Err(CoreError::SettingsData(
            "pars_users не является cловарём".to_owned(),
        ));
    }
    if !doc.get("black_list_buttons").is_some_and(Value::is_array) {
        return Err(CoreError::SettingsData(
            "black_list_buttons не является списком".to_owned(),
        ));
    }
    if !doc.get("url_list_buttons").is_some_and(Value::is_array) {
        return Err(CoreError::SettingsData(
            "url_list_buttons не является списком".to_owned(),
        ));
    }
    Ok(())
}

/// Field must be present and non-null; an empty string still counts as
/// present (a cleared form field is a value, not an omission).
fn present<'a>(
    doc: &'a Map<String, Value>,
    key: &str,
    missing: &str,
) -> Result<&'a Value, CoreError> {
    match doc.get(key) {
        Some(value) if !value.is_null() => Ok(value),
        _ => Err(CoreError::ConfigData(missing.to_owned())),
    }
}

fn optional(doc: &Map<String, Value>, key: &str) -> Value {
    doc.get(key).cloned().unwrap_or(Value::Null)
}

/// A media field equal to the UI's placeholder image means "no media".
fn media_or_placeholder(doc: &Map<String, Value>, key: &str) -> Value {
    let media = optional(doc, key);
    if doc.get("default_file").is_some_and(|placeholder| *placeholder == media) {
        Value::Null
    } else {
        media
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw_config() -> Map<String, Value> {
        let mut delays = Map::new();
        for range in DELAY_RANGE_KEYS {
            delays.insert(range.to_owned(), json!({"min": 1, "max": 5}));
        }
        delays.insert(
            "sleep_blocks".to_owned(),
            json!([{"start": "23:00", "end": "07:00"}]),
        );

        json!({
            "list_accounts": ["+79990001122", "+79990001133"],
            "variation_answer": 0,
            "answer_static_text_content": "привет",
            "answer_static_lang_content": "",
            "answer_media_file": "answer.jpg",
            "translate_fio": false,
            "variation_target": "user",
            "variation_base": "chat",
            "base_file": "base.txt",
            "uniq_profile": 1,
            "slow_mode": 0,
            "clear_history_base": 1,
            "variation_mailing": 0,
            "static_text_content": "текст рассылки",
            "static_lang_content": "",
            "mailing_media_file": "mailing.jpg",
            "default_file": "select_file.png",
            "no_doc_file": "no_doc.png",
            "yes_doc_file": "yes_doc.png",
            "time_dilay": delays,
            "pars_users": {"premium": true},
            "black_list_buttons": [],
            "url_list_buttons": [],
            "const": {"system_version": "4.16.30"},
            "settings_mailing_chats": {"repeats": 2, "wait_msg_chats": 10},
            "settings_II": {"prompt": "отвечай вежливо"},
            "settings_dilay_mailing_to_target": {"user": 1, "chat": 2},
        })
        .as_object()
        .cloned()
        .unwrap()
    }

    #[test]
    fn valid_config_gets_an_id_and_loses_placeholder_keys() {
        let task = validate_task_config(raw_config()).unwrap();
        assert_eq!(task.id().len(), 6);
        assert!(task.id().chars().all(|c| c.is_ascii_digit()));
        for key in PLACEHOLDER_FILE_KEYS {
            assert!(task.get(key).is_none(), "{key} should be stripped");
        }
    }

    #[test]
    fn every_missing_delay_range_is_named_in_the_error() {
        for range in DELAY_RANGE_KEYS {
            let mut raw = raw_config();
            let delays = raw
                .get_mut("time_dilay")
                .and_then(Value::as_object_mut)
                .unwrap();
            delays.remove(range);

            let err = validate_task_config(raw).unwrap_err();
            match err {
                CoreError::SettingsData(description) => {
                    assert!(description.contains(range), "{description} misses {range}");
                }
                other => panic!("unexpected error for {range}: {other:?}"),
            }
        }
    }

    #[test]
    fn account_dedup_is_exact_and_idempotent() {
        let mut raw = raw_config();
        raw.insert(
            "list_accounts".to_owned(),
            json!(["+1", "+2", "+1", "+3", "+2"]),
        );
        let once = validate_task_config(raw).unwrap();
        assert_eq!(once.list_accounts(), &[json!("+1"), json!("+2"), json!("+3")]);

        let twice = validate_task_config(once.into_map()).unwrap();
        assert_eq!(twice.list_accounts(), &[json!("+1"), json!("+2"), json!("+3")]);
    }

    #[test]
    fn empty_account_list_fails() {
        let mut raw = raw_config();
        raw.insert("list_accounts".to_owned(), json!([]));
        assert!(matches!(
            validate_task_config(raw),
            Err(CoreError::ConfigData(_))
        ));
    }

    #[test]
    fn placeholder_answer_media_becomes_null() {
        let mut raw = raw_config();
        raw.insert("answer_media_file".to_owned(), json!("select_file.png"));
        let task = validate_task_config(raw).unwrap();
        assert_eq!(task.get_path(&["answer_data", "media"]), Some(&json!(null)));

        let task = validate_task_config(raw_config()).unwrap();
        assert_eq!(
            task.get_path(&["answer_data", "media"]),
            Some(&json!("answer.jpg"))
        );
    }

    #[test]
    fn prompt_answer_requires_prompt_text() {
        let mut raw = raw_config();
        raw.insert("variation_answer".to_owned(), json!(1));
        raw.remove("prompt_text_content");
        let err = validate_task_config(raw).unwrap_err();
        assert!(err.to_string().contains("Промпте"));

        let mut raw = raw_config();
        raw.insert("variation_answer".to_owned(), json!(1));
        raw.insert("prompt_text_content".to_owned(), json!("будь краток"));
        let task = validate_task_config(raw).unwrap();
        assert_eq!(
            task.get("answer_data"),
            Some(&json!({"variation": "II", "prompt": "будь краток"}))
        );
    }

    #[test]
    fn answer_variants_without_extra_fields_build_their_shapes() {
        let mut raw = raw_config();
        raw.insert("variation_answer".to_owned(), json!(2));
        let task = validate_task_config(raw).unwrap();
        assert_eq!(task.get("answer_data"), Some(&json!({"variation": "dynamic"})));

        let mut raw = raw_config();
        raw.insert("variation_answer".to_owned(), json!(3));
        let task = validate_task_config(raw).unwrap();
        assert_eq!(task.get("answer_data"), Some(&json!({"variation": null})));
    }

    #[test]
    fn out_of_domain_variants_fail() {
        let mut raw = raw_config();
        raw.insert("variation_answer".to_owned(), json!(9));
        assert!(matches!(
            validate_task_config(raw),
            Err(CoreError::ConfigData(_))
        ));

        let mut raw = raw_config();
        raw.insert("variation_mailing".to_owned(), json!(5));
        assert!(matches!(
            validate_task_config(raw),
            Err(CoreError::ConfigData(_))
        ));
    }

    #[test]
    fn empty_string_counts_as_present() {
        let mut raw = raw_config();
        raw.insert("variation_target".to_owned(), json!(""));
        assert!(validate_task_config(raw).is_ok());

        let mut raw = raw_config();
        raw.insert("variation_target".to_owned(), json!(null));
        let err = validate_task_config(raw).unwrap_err();
        assert!(err.to_string().contains("целей"));
    }

    #[test]
    fn self_mailing_clears_channel_data() {
        let task = validate_task_config(raw_config()).unwrap();
        assert_eq!(task.get("channel_data"), Some(&json!(null)));
        assert_eq!(
            task.get_path(&["message_data", "text_sms", "text", "default"]),
            Some(&json!("текст рассылки"))
        );
    }

    fn channel_config() -> Map<String, Value> {
        let mut raw = raw_config();
        raw.insert("variation_mailing".to_owned(), json!(1));
        raw.insert("channel_title".to_owned(), json!("Новости"));
        raw.insert("channel_description".to_owned(), json!("описание"));
        raw.insert("channel_btn_text".to_owned(), json!("Открыть"));
        raw.insert("channel_btn_url".to_owned(), json!("https://t.me/primer"));
        raw.insert("channel_text_content".to_owned(), json!("текст канала"));
        raw
    }

    #[test]
    fn channel_mailing_without_button_url_names_the_field() {
        let mut raw = channel_config();
        raw.remove("channel_btn_url");
        let err = validate_task_config(raw).unwrap_err();
        match err {
            CoreError::ConfigData(description) => {
                assert!(description.contains("URL для Кнопки"), "{description}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn channel_mailing_builds_channel_and_message_blocks() {
        let task = validate_task_config(channel_config()).unwrap();
        assert_eq!(
            task.get_path(&["channel_data", "link"]),
            Some(&json!("https://t.me/primer"))
        );
        assert_eq!(
            task.get_path(&["message_data", "text_sms", "text", "default"]),
            Some(&json!("текст канала"))
        );
        assert_eq!(
            task.get_path(&["message_data", "text_sms", "language_matching"]),
            Some(&json!(null))
        );
    }

    #[test]
    fn sleep_block_without_end_fails() {
        let mut raw = raw_config();
        raw.get_mut("time_dilay")
            .and_then(Value::as_object_mut)
            .unwrap()
            .insert("sleep_blocks".to_owned(), json!([{"start": "23:00"}]));
        let err = validate_task_config(raw).unwrap_err();
        assert!(err.to_string().contains("нет конца"));
    }

    #[test]
    fn missing_nested_settings_key_is_named() {
        let mut raw = raw_config();
        raw.get_mut("settings_mailing_chats")
            .and_then(Value::as_object_mut)
            .unwrap()
            .remove("repeats");
        let err = validate_task_config(raw).unwrap_err();
        match err {
            CoreError::SettingsData(description) => {
                assert!(description.contains("settings_mailing_chats.repeats"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
