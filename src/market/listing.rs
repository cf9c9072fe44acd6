use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::batch::types::ResponseData;
use crate::config::ConfigError;

/// Subscription length sold by a listing.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum DurationClass {
    /// 3 months
    Short,
    /// 6 months
    Medium,
    /// 12 months
    Long,
}

impl DurationClass {
    pub const ALL: [DurationClass; 3] = [
        DurationClass::Short,
        DurationClass::Medium,
        DurationClass::Long,
    ];

    /// Day count the marketplace reports as `gifts_duration`
    pub fn days(self) -> u32 {
        match self {
            DurationClass::Short => 90,
            DurationClass::Medium => 180,
            DurationClass::Long => 360,
        }
    }

    pub fn from_days(days: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.days() == days)
    }

    pub fn months(self) -> u32 {
        match self {
            DurationClass::Short => 3,
            DurationClass::Medium => 6,
            DurationClass::Long => 12,
        }
    }
}

impl fmt::Display for DurationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} months", self.months())
    }
}

/// Listing title in both languages the marketplace displays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Titles {
    pub ru: String,
    pub en: String,
}

impl Titles {
    pub fn builtin(duration: DurationClass) -> Self {
        let (ru_months, en_months) = match duration {
            DurationClass::Short => ("3 месяца", "3 months"),
            DurationClass::Medium => ("6 месяцев", "6 months"),
            DurationClass::Long => ("12 месяцев", "12 months"),
        };
        Self {
            ru: format!(
                "Постоянникам СКИДКИ | Telegram Premium {} | Ссылкой | Оставьте отзыв",
                ru_months
            ),
            en: format!(
                "DISCOUNTS for regulars | Telegram Premium {} | Link | Leave a review",
                en_months
            ),
        }
    }
}

/// Titles per duration class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TitleSet {
    pub short: Titles,
    pub medium: Titles,
    pub long: Titles,
}

impl Default for TitleSet {
    fn default() -> Self {
        Self {
            short: Titles::builtin(DurationClass::Short),
            medium: Titles::builtin(DurationClass::Medium),
            long: Titles::builtin(DurationClass::Long),
        }
    }
}

impl TitleSet {
    pub fn get(&self, duration: DurationClass) -> &Titles {
        match duration {
            DurationClass::Short => &self.short,
            DurationClass::Medium => &self.medium,
            DurationClass::Long => &self.long,
        }
    }
}

const DEFAULT_DESCRIPTION: &str = "===== DESCRIPTION ===== After purchase, you will receive a gift link to activate your premium subscription. The marketplace automatically checks the link before purchase. If you have any difficulties, write to me in private messages on the market. ===== ОПИСАНИЕ ===== После покупки вы получите подарочную ссылку для активации премиум подписки. Товар автоматически проверяется маркетом на валидность при покупке. В случае затруднений пишите мне в личные сообщения на маркете.";

/// Fixed fields of every listing created by the uploader.
///
/// Loaded once at startup and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingTemplate {
    pub category_id: u32,
    pub currency: String,
    pub item_origin: String,
    pub description: String,
    pub allow_ask_discount: bool,
    pub extra: Value,
    /// Reason sent with every removal
    pub removal_reason: String,
    /// currency code -> display name
    pub available_currencies: BTreeMap<String, String>,
    /// origin code -> display name
    pub available_origins: BTreeMap<String, String>,
    pub titles: TitleSet,
}

impl Default for ListingTemplate {
    fn default() -> Self {
        let pairs = |entries: &[(&str, &str)]| {
            entries
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>()
        };

        Self {
            category_id: 30,
            currency: "rub".to_string(),
            item_origin: "personal".to_string(),
            description: DEFAULT_DESCRIPTION.to_string(),
            allow_ask_discount: false,
            extra: serde_json::json!({ "service": "telegram" }),
            removal_reason: "Выдача в телеграм".to_string(),
            available_currencies: pairs(&[
                ("cny", "Chinese yuan"),
                ("eur", "Euro"),
                ("gbp", "Pound sterling"),
                ("kzt", "Kazakhstani tenge"),
                ("rub", "Russian ruble"),
                ("try", "Turkish lira"),
                ("uah", "Ukrainian hryvnia"),
                ("usd", "US dollar"),
            ]),
            available_origins: pairs(&[
                ("autoreg", "Autoreg"),
                ("brute", "Brute"),
                ("dummy", "Dummy"),
                ("personal", "Personal"),
                ("phishing", "Phishing"),
                ("resale", "Resale"),
                ("stealer", "Stealer"),
            ]),
            titles: TitleSet::default(),
        }
    }
}

impl ListingTemplate {
    pub fn titles_for(&self, duration: DurationClass) -> &Titles {
        self.titles.get(duration)
    }

    /// Request body for `POST /item/fast-sell`
    pub fn payload(&self, login: &str, price: u64, duration: DurationClass) -> ListingPayload {
        let titles = self.titles_for(duration).clone();
        ListingPayload {
            category_id: self.category_id,
            currency: self.currency.clone(),
            item_origin: self.item_origin.clone(),
            title: titles.ru,
            title_en: titles.en,
            price,
            allow_ask_discount: self.allow_ask_discount,
            description: self.description.clone(),
            login: login.to_string(),
            extra: self.extra.clone(),
        }
    }

    pub fn with_currency(mut self, currency: &str) -> Result<Self, ConfigError> {
        let currency = currency.to_lowercase();
        if !self.available_currencies.contains_key(&currency) {
            return Err(ConfigError::UnknownCurrency(currency));
        }
        self.currency = currency;
        Ok(self)
    }

    pub fn with_origin(mut self, origin: &str) -> Result<Self, ConfigError> {
        if !self.available_origins.contains_key(origin) {
            return Err(ConfigError::UnknownOrigin(origin.to_string()));
        }
        self.item_origin = origin.to_string();
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.available_currencies.contains_key(&self.currency) {
            return Err(ConfigError::UnknownCurrency(self.currency.clone()));
        }
        if !self.available_origins.contains_key(&self.item_origin) {
            return Err(ConfigError::UnknownOrigin(self.item_origin.clone()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ListingPayload {
    pub category_id: u32,
    pub currency: String,
    pub item_origin: String,
    pub title: String,
    pub title_en: String,
    pub price: u64,
    pub allow_ask_discount: bool,
    pub description: String,
    pub login: String,
    pub extra: Value,
}

/// Listing id from a `{"item": {"item_id": ...}}` response, if present.
pub fn listing_id(data: &ResponseData) -> Option<String> {
    let id = data.as_json()?.get("item")?.get("item_id")?;
    match id {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        _ => None,
    }
}
