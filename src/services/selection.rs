//! Selection flow of a single booking session.
//!
//! Movie, theatre, showtime and seats are picked in that order. Choosing
//! anything resets every choice made after it, and each event answers with
//! the render commands the client has to apply.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{BookingError, BookingResult};
use crate::models::{MovieId, SeatPosition, Showtime, ShowtimeId, TheatreId, Ticket};
use crate::services::booking::{BookingService, PurchaseRequest};
use crate::services::seat_grid::SeatGrid;

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SelectionEvent {
    SelectMovie { title: String },
    SelectTheatre { name: String },
    /// `starts_at` is the display form, `YYYY-MM-DD HH:MM:SS`.
    SelectShowtime { starts_at: String },
    ToggleSeat { row: i32, col: i32 },
    SubmitPurchase {
        price_per_seat: f64,
        #[serde(default)]
        coupon_code: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RenderCommand {
    PopulateMovies { titles: Vec<String> },
    PopulateTheatres { names: Vec<String> },
    PopulateShowtimes { times: Vec<String> },
    ClearShowtimes,
    RenderSeatGrid { grid: SeatGrid },
    SetSeatControls { enabled: bool },
    HighlightSeats { seats: Vec<SeatPosition> },
    PurchaseCompleted { ticket: Ticket },
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SelectionState {
    #[default]
    NoSelection,
    MovieSelected {
        movie_id: MovieId,
    },
    TheatreSelected {
        movie_id: MovieId,
        theatre_id: TheatreId,
    },
    ShowtimeSelected {
        movie_id: MovieId,
        theatre_id: TheatreId,
        showtime_id: ShowtimeId,
    },
    SeatsSelected {
        movie_id: MovieId,
        theatre_id: TheatreId,
        showtime_id: ShowtimeId,
        seats: BTreeSet<SeatPosition>,
    },
}

impl SelectionState {
    pub fn movie(&self) -> Option<MovieId> {
        match self {
            SelectionState::NoSelection => None,
            SelectionState::MovieSelected { movie_id }
            | SelectionState::TheatreSelected { movie_id, .. }
            | SelectionState::ShowtimeSelected { movie_id, .. }
            | SelectionState::SeatsSelected { movie_id, .. } => Some(*movie_id),
        }
    }

    pub fn theatre(&self) -> Option<(MovieId, TheatreId)> {
        match self {
            SelectionState::TheatreSelected { movie_id, theatre_id }
            | SelectionState::ShowtimeSelected { movie_id, theatre_id, .. }
            | SelectionState::SeatsSelected { movie_id, theatre_id, .. } => Some((*movie_id, *theatre_id)),
            _ => None,
        }
    }

    pub fn showtime(&self) -> Option<(MovieId, TheatreId, ShowtimeId)> {
        match self {
            SelectionState::ShowtimeSelected { movie_id, theatre_id, showtime_id }
            | SelectionState::SeatsSelected { movie_id, theatre_id, showtime_id, .. } => {
                Some((*movie_id, *theatre_id, *showtime_id))
            }
            _ => None,
        }
    }

    pub fn seats(&self) -> Option<&BTreeSet<SeatPosition>> {
        match self {
            SelectionState::SeatsSelected { seats, .. } => Some(seats),
            _ => None,
        }
    }

    /// State after toggling `seat`. Dropping the last seat goes back to
    /// `ShowtimeSelected`.
    fn toggled(&self, seat: SeatPosition) -> Option<SelectionState> {
        let (movie_id, theatre_id, showtime_id) = self.showtime()?;
        let mut seats = self.seats().cloned().unwrap_or_default();
        if !seats.remove(&seat) {
            seats.insert(seat);
        }

        Some(if seats.is_empty() {
            SelectionState::ShowtimeSelected { movie_id, theatre_id, showtime_id }
        } else {
            SelectionState::SeatsSelected { movie_id, theatre_id, showtime_id, seats }
        })
    }
}

pub struct SelectionController {
    service: BookingService,
    state: SelectionState,
    grid: Option<SeatGrid>,
}

impl SelectionController {
    pub fn new(service: BookingService) -> Self {
        Self { service, state: SelectionState::NoSelection, grid: None }
    }

    pub fn state(&self) -> &SelectionState {
        &self.state
    }

    /// Commands for a freshly opened session.
    pub async fn open(&mut self) -> BookingResult<Vec<RenderCommand>> {
        let titles = self.service.movies().await?.into_iter().map(|m| m.title).collect();
        self.state = SelectionState::NoSelection;
        self.grid = None;
        Ok(vec![
            RenderCommand::PopulateMovies { titles },
            RenderCommand::SetSeatControls { enabled: false },
        ])
    }

    /// Applies one event. On error the state is left as it was.
    pub async fn handle(&mut self, event: SelectionEvent) -> BookingResult<Vec<RenderCommand>> {
        debug!("selection event {:?} in state {:?}", event, self.state);
        match event {
            SelectionEvent::SelectMovie { title } => self.select_movie(&title).await,
            SelectionEvent::SelectTheatre { name } => self.select_theatre(&name).await,
            SelectionEvent::SelectShowtime { starts_at } => self.select_showtime(&starts_at).await,
            SelectionEvent::ToggleSeat { row, col } => self.toggle_seat(SeatPosition::new(row, col)),
            SelectionEvent::SubmitPurchase { price_per_seat, coupon_code } => {
                self.submit_purchase(price_per_seat, coupon_code).await
            }
        }
    }

    async fn select_movie(&mut self, title: &str) -> BookingResult<Vec<RenderCommand>> {
        let movie_id = self.service.movie_id_by_title(title).await?;
        let names = self
            .service
            .theatres_showing(movie_id)
            .await?
            .into_iter()
            .map(|t| t.name)
            .collect();

        self.state = SelectionState::MovieSelected { movie_id };
        self.grid = None;
        Ok(vec![
            RenderCommand::ClearShowtimes,
            RenderCommand::SetSeatControls { enabled: false },
            RenderCommand::PopulateTheatres { names },
        ])
    }

    async fn select_theatre(&mut self, name: &str) -> BookingResult<Vec<RenderCommand>> {
        let movie_id = self
            .state
            .movie()
            .ok_or_else(|| BookingError::invalid("select a movie before a theatre"))?;
        let theatre_id = self.service.theatre_id_by_name(name).await?;
        let times = self
            .service
            .showtimes(movie_id, theatre_id)
            .await?
            .iter()
            .map(Showtime::display)
            .collect();

        self.state = SelectionState::TheatreSelected { movie_id, theatre_id };
        self.grid = None;
        Ok(vec![
            RenderCommand::SetSeatControls { enabled: false },
            RenderCommand::PopulateShowtimes { times },
        ])
    }

    async fn select_showtime(&mut self, starts_at: &str) -> BookingResult<Vec<RenderCommand>> {
        let (movie_id, theatre_id) = self
            .state
            .theatre()
            .ok_or_else(|| BookingError::invalid("select a theatre before a showtime"))?;
        let when = Showtime::parse_display(starts_at)
            .ok_or_else(|| BookingError::invalid(format!("unrecognised showtime '{}'", starts_at)))?;
        let showtime_id = self
            .service
            .store()
            .find_showtime_id(movie_id, theatre_id, when)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", starts_at))?;
        let grid = self.service.seat_grid(showtime_id).await?;

        self.state = SelectionState::ShowtimeSelected { movie_id, theatre_id, showtime_id };
        self.grid = Some(grid.clone());
        Ok(vec![
            RenderCommand::RenderSeatGrid { grid },
            RenderCommand::SetSeatControls { enabled: true },
        ])
    }

    fn toggle_seat(&mut self, seat: SeatPosition) -> BookingResult<Vec<RenderCommand>> {
        if self.state.showtime().is_none() {
            return Err(BookingError::invalid("select a showtime before choosing seats"));
        }
        if !seat.in_bounds() {
            return Err(BookingError::invalid(format!("{} is outside the auditorium", seat)));
        }
        if let Some(grid) = &self.grid {
            if !grid.is_available(&seat) {
                return Err(BookingError::invalid(format!("{} is already taken", seat)));
            }
        }

        let next = self
            .state
            .toggled(seat)
            .ok_or_else(|| BookingError::invalid("select a showtime before choosing seats"))?;
        self.state = next;

        let seats = self.state.seats().map(|s| s.iter().copied().collect()).unwrap_or_default();
        Ok(vec![RenderCommand::HighlightSeats { seats }])
    }

    async fn submit_purchase(
        &mut self,
        price_per_seat: f64,
        coupon_code: Option<String>,
    ) -> BookingResult<Vec<RenderCommand>> {
        let SelectionState::SeatsSelected { movie_id, theatre_id, showtime_id, seats } = &self.state else {
            return Err(BookingError::invalid("select at least one seat before purchasing"));
        };
        let (movie_id, theatre_id, showtime_id) = (*movie_id, *theatre_id, *showtime_id);

        let ticket = self
            .service
            .purchase(PurchaseRequest {
                showtime_id,
                seats: seats.iter().copied().collect(),
                price_per_seat,
                coupon_code,
            })
            .await?;

        // The ticket exists now; a failed refresh must not hide that
        let grid = match self.service.seat_grid(showtime_id).await {
            Ok(grid) => grid,
            Err(e) => {
                warn!("could not refresh seat grid for showtime {}: {}", showtime_id, e);
                let mut occupied: Vec<SeatPosition> = self
                    .grid
                    .as_ref()
                    .map(|g| g.occupied_seats().collect())
                    .unwrap_or_default();
                occupied.extend(ticket.seats.iter().copied());
                SeatGrid::build(showtime_id, &occupied)
            }
        };

        self.state = SelectionState::ShowtimeSelected { movie_id, theatre_id, showtime_id };
        self.grid = Some(grid.clone());
        Ok(vec![
            RenderCommand::PurchaseCompleted { ticket },
            RenderCommand::RenderSeatGrid { grid },
            RenderCommand::HighlightSeats { seats: Vec::new() },
        ])
    }
}
