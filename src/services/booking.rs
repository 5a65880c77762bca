//! Booking validation and the ticket-purchase flow.
//!
//! [`check_availability`] is the rule every store applies inside its atomic
//! check-and-insert; [`BookingService`] is what the HTTP layer and the
//! selection sessions talk to.

use std::collections::BTreeSet;
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::CacheService;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Coupon, Movie, MovieId, NewTicket, Payment, RegisteredUser, SeatPosition, Showtime,
    ShowtimeId, Theatre, TheatreId, Ticket,
};
use crate::services::seat_grid::SeatGrid;
use crate::store::Store;

/// What "already booked" means for a showtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BookingGranularity {
    /// A showtime takes a single ticket; any second ticket is a duplicate.
    #[default]
    PerShowtime,
    /// A ticket is a duplicate only if it claims a seat that is already sold.
    PerSeat,
}

impl FromStr for BookingGranularity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "per-showtime" | "showtime" => Ok(BookingGranularity::PerShowtime),
            "per-seat" | "seat" => Ok(BookingGranularity::PerSeat),
            other => Err(format!("unknown booking granularity '{}'", other)),
        }
    }
}

/// Checks the parts of a ticket that do not depend on the store.
pub fn validate_ticket(ticket: &NewTicket) -> BookingResult<()> {
    if !ticket.price.is_finite() || ticket.price < 0.0 {
        return Err(BookingError::invalid(format!("price must be a non-negative amount, got {}", ticket.price)));
    }

    let mut seen = BTreeSet::new();
    for seat in &ticket.seats {
        if !seat.in_bounds() {
            return Err(BookingError::invalid(format!("{} is outside the auditorium", seat)));
        }
        if !seen.insert(*seat) {
            return Err(BookingError::invalid(format!("{} requested twice", seat)));
        }
    }
    Ok(())
}

/// Decides whether `ticket` may be inserted given what the showtime already holds.
///
/// Must run in the same atomic section as the insert that follows it.
pub fn check_availability(
    granularity: BookingGranularity,
    ticket: &NewTicket,
    existing_tickets: usize,
    occupied: &BTreeSet<SeatPosition>,
) -> BookingResult<()> {
    match granularity {
        BookingGranularity::PerShowtime if existing_tickets > 0 => Err(BookingError::DuplicateBooking {
            showtime_id: ticket.showtime_id,
            seats: Vec::new(),
        }),
        BookingGranularity::PerShowtime => Ok(()),
        BookingGranularity::PerSeat => {
            let taken: Vec<SeatPosition> = ticket
                .seats
                .iter()
                .filter(|seat| occupied.contains(seat))
                .copied()
                .collect();
            if taken.is_empty() {
                Ok(())
            } else {
                Err(BookingError::DuplicateBooking { showtime_id: ticket.showtime_id, seats: taken })
            }
        }
    }
}

fn round_to_cents(amount: f64) -> f64 {
    (amount * 100.0).round() / 100.0
}

#[cfg(not(test))]
const UNKNOWN_USER_HASH_COST: u32 = bcrypt::DEFAULT_COST;
#[cfg(test)]
const UNKNOWN_USER_HASH_COST: u32 = 4;

/// Hash checked against when the email has no account.
fn unknown_user_hash() -> Option<&'static str> {
    static HASH: OnceLock<Option<String>> = OnceLock::new();
    HASH.get_or_init(|| bcrypt::hash("unknown-user", UNKNOWN_USER_HASH_COST).ok())
        .as_deref()
}

#[derive(Debug, Clone, Deserialize)]
pub struct PurchaseRequest {
    pub showtime_id: ShowtimeId,
    pub seats: Vec<SeatPosition>,
    pub price_per_seat: f64,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

#[derive(Clone)]
pub struct BookingService {
    store: Arc<dyn Store>,
    cache: Option<CacheService>,
    granularity: BookingGranularity,
}

impl BookingService {
    pub fn new(store: Arc<dyn Store>, cache: Option<CacheService>, granularity: BookingGranularity) -> Self {
        Self { store, cache, granularity }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    /// Creates a ticket after checking the showtime exists and is not already booked.
    pub async fn insert_ticket(&self, ticket: NewTicket) -> BookingResult<Ticket> {
        validate_ticket(&ticket)?;

        let created = self.store.insert_ticket(&ticket, self.granularity).await?;
        info!(
            "ticket {} created for showtime {} ({} seats, {:.2})",
            created.id,
            created.showtime_id,
            created.seats.len(),
            created.price
        );

        if let Some(cache) = &self.cache {
            cache.invalidate_seats(created.showtime_id).await;
        }
        Ok(created)
    }

    pub async fn purchase(&self, request: PurchaseRequest) -> BookingResult<Ticket> {
        self.purchase_on(request, chrono::Local::now().date_naive()).await
    }

    /// Purchase with an explicit "today", used to judge coupon expiry.
    pub async fn purchase_on(&self, request: PurchaseRequest, today: NaiveDate) -> BookingResult<Ticket> {
        if request.seats.is_empty() {
            return Err(BookingError::invalid("select at least one seat"));
        }
        // Checked before the coupon, which floors the total at zero
        if !request.price_per_seat.is_finite() || request.price_per_seat < 0.0 {
            return Err(BookingError::invalid(format!(
                "price per seat must be a non-negative amount, got {}",
                request.price_per_seat
            )));
        }

        let mut price = request.price_per_seat * request.seats.len() as f64;

        if let Some(code) = request.coupon_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            let coupon = self
                .store
                .find_coupon(code)
                .await?
                .ok_or_else(|| BookingError::not_found("coupon", code))?;
            if coupon.is_expired(today) {
                return Err(BookingError::invalid(format!("coupon {} expired on {}", coupon.code, coupon.expiry)));
            }
            price = coupon.apply(price);
        }

        self.insert_ticket(NewTicket::new(request.showtime_id, round_to_cents(price)).with_seats(request.seats))
            .await
    }

    pub async fn seat_grid(&self, showtime_id: ShowtimeId) -> BookingResult<SeatGrid> {
        if let Some(cache) = &self.cache {
            if let Some(grid) = cache.get_seat_grid(showtime_id).await {
                return Ok(grid);
            }
        }

        self.require_showtime(showtime_id).await?;
        let occupied = self.store.find_occupied_seats(showtime_id).await?;
        let grid = SeatGrid::build(showtime_id, &occupied);

        if let Some(cache) = &self.cache {
            cache.save_seat_grid(&grid).await;
        }
        Ok(grid)
    }

    pub async fn require_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Showtime> {
        self.store
            .find_showtime(showtime_id)
            .await?
            .ok_or_else(|| BookingError::not_found("showtime", showtime_id))
    }

    pub async fn movies(&self) -> BookingResult<Vec<Movie>> {
        self.store.find_movies().await
    }

    pub async fn theatres(&self) -> BookingResult<Vec<Theatre>> {
        self.store.find_theatres().await
    }

    /// Theatres that have at least one showtime of `movie_id`, in name order.
    pub async fn theatres_showing(&self, movie_id: MovieId) -> BookingResult<Vec<Theatre>> {
        let ids = self.store.find_theatres_showing_movie(movie_id).await?;
        let theatres = self.store.find_theatres().await?;
        Ok(theatres.into_iter().filter(|t| ids.contains(&t.id)).collect())
    }

    pub async fn showtimes(&self, movie_id: MovieId, theatre_id: TheatreId) -> BookingResult<Vec<Showtime>> {
        self.store.find_showtimes(movie_id, theatre_id).await
    }

    pub async fn movie_id_by_title(&self, title: &str) -> BookingResult<MovieId> {
        self.store
            .find_movie_id_by_title(title)
            .await?
            .ok_or_else(|| BookingError::not_found("movie", title))
    }

    pub async fn theatre_id_by_name(&self, name: &str) -> BookingResult<TheatreId> {
        self.store
            .find_theatre_id_by_name(name)
            .await?
            .ok_or_else(|| BookingError::not_found("theatre", name))
    }

    pub async fn authenticate(&self, email: &str, password: &str) -> BookingResult<RegisteredUser> {
        let verified = match self.store.find_user_by_email(email).await? {
            Some(user) => user.verify_password(password).then_some(user),
            None => {
                // Equal bcrypt work for unknown emails
                if let Some(hash) = unknown_user_hash() {
                    let _ = bcrypt::verify(password, hash);
                }
                None
            }
        };

        match verified {
            Some(user) => {
                info!("user {} logged in", user.id);
                Ok(user)
            }
            None => {
                warn!("failed login attempt");
                Err(BookingError::Unauthorized)
            }
        }
    }

    pub async fn payment(&self, payment_id: i32) -> BookingResult<Payment> {
        self.store
            .find_payment(payment_id)
            .await?
            .ok_or_else(|| BookingError::not_found("payment", payment_id))
    }

    pub async fn coupon(&self, code: &str) -> BookingResult<Coupon> {
        self.store
            .find_coupon(code)
            .await?
            .ok_or_else(|| BookingError::not_found("coupon", code))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryStore;
    use chrono::NaiveDate;

    fn seat(row: i32, col: i32) -> SeatPosition {
        SeatPosition::new(row, col)
    }

    fn service(granularity: BookingGranularity) -> (BookingService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let evening = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(19, 30, 0).unwrap();
        let movie = store.add_movie("Dune", 8.1);
        let theatre = store.add_theatre("Chinook");
        store.add_showtime_with_id(7, movie, theatre, evening);
        store.add_showtime_with_id(8, movie, theatre, evening + chrono::Duration::hours(3));
        (BookingService::new(store.clone(), None, granularity), store)
    }

    #[test]
    fn parses_granularity_names() {
        assert_eq!("per-seat".parse::<BookingGranularity>(), Ok(BookingGranularity::PerSeat));
        assert_eq!("Per-Showtime".parse::<BookingGranularity>(), Ok(BookingGranularity::PerShowtime));
        assert!("per-row".parse::<BookingGranularity>().is_err());
    }

    #[test]
    fn rejects_bad_prices_and_seats() {
        assert!(validate_ticket(&NewTicket::new(1, -1.0)).is_err());
        assert!(validate_ticket(&NewTicket::new(1, f64::NAN)).is_err());
        assert!(validate_ticket(&NewTicket::new(1, 10.0).with_seats([seat(0, 3)])).is_err());
        assert!(validate_ticket(&NewTicket::new(1, 10.0).with_seats([seat(2, 3), seat(2, 3)])).is_err());
        assert!(validate_ticket(&NewTicket::new(1, 0.0).with_seats([seat(2, 3), seat(2, 4)])).is_ok());
    }

    #[test]
    fn per_showtime_rejects_any_second_ticket() {
        let ticket = NewTicket::new(7, 12.5);
        let none = BTreeSet::new();
        assert!(check_availability(BookingGranularity::PerShowtime, &ticket, 0, &none).is_ok());
        assert!(matches!(
            check_availability(BookingGranularity::PerShowtime, &ticket, 1, &none),
            Err(BookingError::DuplicateBooking { showtime_id: 7, .. })
        ));
    }

    #[test]
    fn per_seat_reports_colliding_seats() {
        let occupied: BTreeSet<_> = [seat(1, 1), seat(3, 5)].into_iter().collect();
        let ticket = NewTicket::new(7, 12.5).with_seats([seat(3, 5), seat(3, 6)]);
        match check_availability(BookingGranularity::PerSeat, &ticket, 1, &occupied) {
            Err(BookingError::DuplicateBooking { seats, .. }) => assert_eq!(seats, vec![seat(3, 5)]),
            other => panic!("expected duplicate booking, got {:?}", other),
        }

        let ticket = NewTicket::new(7, 12.5).with_seats([seat(4, 5)]);
        assert!(check_availability(BookingGranularity::PerSeat, &ticket, 1, &occupied).is_ok());
    }

    #[tokio::test]
    async fn second_ticket_for_a_showtime_is_a_duplicate() {
        let (service, _) = service(BookingGranularity::PerShowtime);

        let ticket = service.insert_ticket(NewTicket::new(7, 12.50)).await.unwrap();
        assert_eq!(ticket.showtime_id, 7);
        assert_eq!(ticket.price, 12.50);

        let err = service.insert_ticket(NewTicket::new(7, 12.50)).await.unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBooking { showtime_id: 7, .. }));

        // other showtimes are unaffected
        assert!(service.insert_ticket(NewTicket::new(8, 9.0)).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_showtime_is_not_found() {
        let (service, _) = service(BookingGranularity::PerShowtime);
        let err = service.insert_ticket(NewTicket::new(404, 10.0)).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { entity: "showtime", .. }));

        let err = service.seat_grid(404).await.unwrap_err();
        assert!(matches!(err, BookingError::NotFound { .. }));
    }

    #[tokio::test]
    async fn per_seat_allows_disjoint_tickets() {
        let (service, _) = service(BookingGranularity::PerSeat);

        service
            .insert_ticket(NewTicket::new(7, 10.0).with_seats([seat(1, 1)]))
            .await
            .unwrap();
        service
            .insert_ticket(NewTicket::new(7, 10.0).with_seats([seat(1, 2)]))
            .await
            .unwrap();
        let err = service
            .insert_ticket(NewTicket::new(7, 10.0).with_seats([seat(1, 2), seat(1, 3)]))
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::DuplicateBooking { .. }));

        let grid = service.seat_grid(7).await.unwrap();
        assert_eq!(grid.occupied_count(), 2);
    }

    #[tokio::test]
    async fn purchase_prices_seats_and_applies_coupons() {
        let (service, store) = service(BookingGranularity::PerSeat);
        store.add_coupon("SPRING", 5.0, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        let ticket = service
            .purchase_on(
                PurchaseRequest {
                    showtime_id: 7,
                    seats: vec![seat(5, 5), seat(5, 6)],
                    price_per_seat: 12.5,
                    coupon_code: Some("SPRING".to_string()),
                },
                today,
            )
            .await
            .unwrap();
        assert_eq!(ticket.price, 20.0);
        assert_eq!(ticket.seats, vec![seat(5, 5), seat(5, 6)]);

        let expired = service
            .purchase_on(
                PurchaseRequest {
                    showtime_id: 7,
                    seats: vec![seat(6, 6)],
                    price_per_seat: 12.5,
                    coupon_code: Some("SPRING".to_string()),
                },
                NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(),
            )
            .await
            .unwrap_err();
        assert!(matches!(expired, BookingError::InvalidRequest(_)));

        let empty = service
            .purchase_on(
                PurchaseRequest { showtime_id: 7, seats: vec![], price_per_seat: 12.5, coupon_code: None },
                today,
            )
            .await
            .unwrap_err();
        assert!(matches!(empty, BookingError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn negative_seat_price_is_rejected_even_with_a_coupon() {
        let (service, store) = service(BookingGranularity::PerSeat);
        store.add_coupon("SPRING", 5.0, NaiveDate::from_ymd_opt(2024, 6, 30).unwrap());
        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();

        for coupon_code in [None, Some("SPRING".to_string())] {
            let err = service
                .purchase_on(
                    PurchaseRequest { showtime_id: 7, seats: vec![seat(1, 1)], price_per_seat: -100.0, coupon_code },
                    today,
                )
                .await
                .unwrap_err();
            assert!(matches!(err, BookingError::InvalidRequest(_)), "{err:?}");
        }

        let err = service
            .purchase_on(
                PurchaseRequest { showtime_id: 7, seats: vec![seat(1, 1)], price_per_seat: f64::INFINITY, coupon_code: None },
                today,
            )
            .await
            .unwrap_err();
        assert!(matches!(err, BookingError::InvalidRequest(_)));
        assert!(store.find_tickets_at_showtime(7).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn purchase_total_is_rounded_to_cents() {
        let (service, _) = service(BookingGranularity::PerSeat);
        let ticket = service
            .purchase_on(
                PurchaseRequest {
                    showtime_id: 7,
                    seats: vec![seat(2, 1), seat(2, 2), seat(2, 3)],
                    price_per_seat: 12.1,
                    coupon_code: None,
                },
                NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(ticket.price, 36.3);
        assert_eq!(round_to_cents(0.1 + 0.2), 0.3);
    }

    #[tokio::test]
    async fn authenticate_checks_the_password() {
        let (service, store) = service(BookingGranularity::PerShowtime);
        let hash = bcrypt::hash("secret", 4).unwrap();
        store.add_user("ada@example.com", &hash, "1 Loop Rd", NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), None);

        assert_eq!(service.authenticate("ada@example.com", "secret").await.unwrap().email, "ada@example.com");
        assert!(matches!(
            service.authenticate("ada@example.com", "wrong").await,
            Err(BookingError::Unauthorized)
        ));
        assert!(matches!(
            service.authenticate("nobody@example.com", "secret").await,
            Err(BookingError::Unauthorized)
        ));
    }
}
