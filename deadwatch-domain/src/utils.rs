// Domain utility functions

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

pub const LOG_TIMESTAMP_FORMAT: &str = "%Y.%m.%d-%H.%M.%S";

pub fn parse_log_timestamp(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), LOG_TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// Extracts the first `YYYY.MM.DD` or `YYYY-MM-DD` date embedded in a file name.
pub fn file_name_date(name: &str) -> Option<NaiveDate> {
    for (index, _) in name.char_indices() {
        let Some(window) = name.get(index..index + 10) else {
            break;
        };
        for format in ["%Y.%m.%d", "%Y-%m-%d", "%Y_%m_%d"] {
            if let Ok(date) = NaiveDate::parse_from_str(window, format) {
                return Some(date);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn parses_log_timestamp() {
        let ts = parse_log_timestamp("2024.03.05-14.07.09").unwrap();
        assert_eq!((ts.year(), ts.month(), ts.day()), (2024, 3, 5));
        assert_eq!((ts.hour(), ts.minute(), ts.second()), (14, 7, 9));
        assert!(parse_log_timestamp("2024-03-05 14:07:09").is_none());
    }

    #[test]
    fn extracts_date_from_file_names() {
        assert_eq!(
            file_name_date("kills_2024.03.05.csv"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(
            file_name_date("2023-12-31-server.log"),
            NaiveDate::from_ymd_opt(2023, 12, 31)
        );
        assert_eq!(file_name_date("current.csv"), None);
    }
}
