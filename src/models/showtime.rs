use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{MovieId, TheatreId};

pub type ShowtimeId = i32;

/// Format used wherever a showtime is shown to, or picked by, a user.
pub const SHOWTIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, PartialEq, FromRow, Serialize, Deserialize)]
pub struct Showtime {
    pub id: ShowtimeId,
    pub movie_id: MovieId,
    pub theatre_id: TheatreId,
    pub starts_at: NaiveDateTime,
}

impl Showtime {
    pub fn display(&self) -> String {
        self.starts_at.format(SHOWTIME_FORMAT).to_string()
    }

    /// Parses the display form back into a timestamp.
    pub fn parse_display(value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value.trim(), SHOWTIME_FORMAT).ok()
    }
}

// What the API hands out: the record plus its display string
#[derive(Debug, Clone, Serialize)]
pub struct ShowtimeView {
    pub id: ShowtimeId,
    pub movie_id: MovieId,
    pub theatre_id: TheatreId,
    pub starts_at: NaiveDateTime,
    pub display: String,
}

impl From<Showtime> for ShowtimeView {
    fn from(showtime: Showtime) -> Self {
        let display = showtime.display();
        ShowtimeView {
            id: showtime.id,
            movie_id: showtime.movie_id,
            theatre_id: showtime.theatre_id,
            starts_at: showtime.starts_at,
            display,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn display_round_trips_through_parse() {
        let starts_at = NaiveDate::from_ymd_opt(2024, 3, 15)
            .unwrap()
            .and_hms_opt(19, 30, 0)
            .unwrap();
        let showtime = Showtime { id: 1, movie_id: 2, theatre_id: 3, starts_at };

        assert_eq!(showtime.display(), "2024-03-15 19:30:00");
        assert_eq!(Showtime::parse_display(" 2024-03-15 19:30:00 "), Some(starts_at));
        assert_eq!(Showtime::parse_display("tomorrow"), None);
    }
}
