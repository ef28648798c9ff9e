use thiserror::Error;

/// Errors crossing the session layer, grouped by the titled categories the
/// client surfaces to the user.
///
/// `ConfigData`, `SettingsData` and `AccountData` descriptions are the
/// product's user-facing strings; `ProtocolParse` and `Serialization` stay
/// in the logs.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    ConfigData(String),
    #[error("{0}")]
    SettingsData(String),
    #[error("{0}")]
    AccountData(String),
    #[error("malformed inbound frame: {0}")]
    ProtocolParse(String),
    #[error("outbound payload not serializable: {0}")]
    Serialization(String),
}

impl CoreError {
    /// Fixed title shown above the error description in user alerts.
    pub fn title(&self) -> &'static str {
        match self {
            CoreError::ConfigData(_) => "Ошибка в конфигурационном файле.",
            CoreError::SettingsData(_) => "Ошибка в файле со стороними настройками.",
            CoreError::AccountData(_) => "Ошибка в данных аккаунта.",
            CoreError::ProtocolParse(_) => "Ошибка протокола.",
            CoreError::Serialization(_) => "Ошибка отправки данных.",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn titles_follow_the_category() {
        let config = CoreError::ConfigData("нет данных".to_owned());
        let settings = CoreError::SettingsData("нет ключа".to_owned());
        assert_ne!(config.title(), settings.title());
        assert_eq!(config.to_string(), "нет данных");
    }
}
