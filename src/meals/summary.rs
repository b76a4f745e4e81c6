use serde::Serialize;
use time::Date;

use super::dto::MealRecord;

time::serde::format_description!(day_format, Date, "[year]-[month]-[day]");

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyTotal {
    #[serde(with = "day_format")]
    pub date: Date,
    pub meals: usize,
    pub calories: u64,
}

pub fn total_calories(meals: &[MealRecord]) -> u64 {
    meals.iter().map(|m| u64::from(m.calories)).sum()
}

/// Groups by UTC calendar day, days ordered by first appearance in `meals`.
pub fn daily_totals(meals: &[MealRecord]) -> Vec<DailyTotal> {
    let mut days: Vec<DailyTotal> = Vec::new();
    for meal in meals {
        let date = meal.created_at.to_offset(time::UtcOffset::UTC).date();
        match days.iter_mut().find(|d| d.date == date) {
            Some(day) => {
                day.meals += 1;
                day.calories += u64::from(meal.calories);
            }
            None => days.push(DailyTotal {
                date,
                meals: 1,
                calories: u64::from(meal.calories),
            }),
        }
    }
    days
}
