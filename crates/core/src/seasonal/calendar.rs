use chrono::{DateTime, Duration, NaiveDate, Utc, Weekday};

use super::{EventWindow, SeasonalEvent};

/// Conventional retail calendar. Windows start at midnight UTC and `end_date`
/// is the first instant after the sale.
pub struct SeasonalCalendar;

impl SeasonalCalendar {
    pub fn standard(year: i32) -> Vec<(SeasonalEvent, EventWindow)> {
        SeasonalEvent::ALL
            .into_iter()
            .filter_map(|event| Self::window(event, year).map(|window| (event, window)))
            .collect()
    }

    pub fn window(event: SeasonalEvent, year: i32) -> Option<EventWindow> {
        let (start, days) = match event {
            SeasonalEvent::BlackFriday => (thanksgiving(year)? + Duration::days(1), 1),
            SeasonalEvent::CyberMonday => (thanksgiving(year)? + Duration::days(4), 1),
            SeasonalEvent::Christmas => (NaiveDate::from_ymd_opt(year, 12, 1)?, 25),
            SeasonalEvent::PrimeDay => {
                (NaiveDate::from_weekday_of_month_opt(year, 7, Weekday::Tue, 2)?, 2)
            }
            SeasonalEvent::BackToSchool => (NaiveDate::from_ymd_opt(year, 7, 15)?, 48),
        };

        let start_date = midnight(start)?;
        Some(EventWindow { start_date, end_date: start_date + Duration::days(days) })
    }
}

fn thanksgiving(year: i32) -> Option<NaiveDate> {
    NaiveDate::from_weekday_of_month_opt(year, 11, Weekday::Thu, 4)
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}
