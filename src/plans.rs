//! Каталог тарифов: цена, срок в днях и названия на трёх языках.

use crate::language::Lang;
use chrono::{Days, NaiveDate};
use serde::Deserialize;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Plan {
    pub id: String,
    pub price: f64,
    pub days: i64,
    pub name_en: String,
    pub name_ru: String,
    pub name_es: String,
}

impl Plan {
    fn new(id: &str, price: f64, days: i64, names: [&str; 3]) -> Self {
        let [name_en, name_ru, name_es] = names;
        Self {
            id: id.to_string(),
            price,
            days,
            name_en: name_en.to_string(),
            name_ru: name_ru.to_string(),
            name_es: name_es.to_string(),
        }
    }

    pub fn name(&self, lang: Lang) -> &str {
        match lang {
            Lang::En => &self.name_en,
            Lang::Ru => &self.name_ru,
            Lang::Es => &self.name_es,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Catalog {
    plans: Vec<Plan>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(vec![
            Plan::new("1mo", 58.0, 30, ["1 Month", "1 Месяц", "1 Mes"]),
            Plan::new("3mo", 148.0, 90, ["3 Months", "3 Месяца", "3 Meses"]),
            Plan::new("1yr", 498.0, 365, ["1 Year", "1 Год", "1 Año"]),
        ])
    }
}

impl Catalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }

    pub fn get(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }
}

/// Дата окончания подписки: покупка плюс срок тарифа в календарных днях.
pub fn subscription_end(purchase: NaiveDate, days: i64) -> Option<NaiveDate> {
    let days = u64::try_from(days).ok()?;
    purchase.checked_add_days(Days::new(days))
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}
