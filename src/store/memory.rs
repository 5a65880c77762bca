//! In-process store. Backs the test suite and the `memory` backend.

use std::collections::BTreeSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveDateTime};

use super::Store;
use crate::error::{BookingError, BookingResult};
use crate::models::{
    Coupon, Movie, MovieId, NewTicket, Payment, RegisteredUser, SeatPosition, Showtime,
    ShowtimeId, Theatre, TheatreId, Ticket, TicketId,
};
use crate::services::booking::{check_availability, BookingGranularity};

// Demo password only; keeps startup fast
const DEMO_HASH_COST: u32 = 6;

#[derive(Debug, Default)]
struct Tables {
    movies: Vec<Movie>,
    theatres: Vec<Theatre>,
    showtimes: Vec<Showtime>,
    tickets: Vec<Ticket>,
    users: Vec<RegisteredUser>,
    payments: Vec<Payment>,
    coupons: Vec<Coupon>,
    next_id: i32,
}

impl Tables {
    fn next_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    fn occupied(&self, showtime_id: ShowtimeId) -> BTreeSet<SeatPosition> {
        self.tickets
            .iter()
            .filter(|t| t.showtime_id == showtime_id)
            .flat_map(|t| t.seats.iter().copied())
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A small catalogue to click through without a database.
    pub fn with_demo_data() -> Self {
        let store = Self::new();
        let today = chrono::Local::now().date_naive();
        let at = |days: i64, hour: u32| {
            (today + chrono::Duration::days(days))
                .and_hms_opt(hour, 0, 0)
                .unwrap_or_default()
        };

        let dune = store.add_movie("Dune: Part Two", 8.6);
        let paddington = store.add_movie("Paddington in Peru", 7.1);
        let alien = store.add_movie("Alien: Romulus", 7.3);
        let chinook = store.add_theatre("Chinook Cinema");
        let crowfoot = store.add_theatre("Crowfoot Crossing");

        store.add_showtime(dune, chinook, at(1, 19));
        store.add_showtime(dune, chinook, at(1, 22));
        store.add_showtime(dune, crowfoot, at(2, 18));
        store.add_showtime(paddington, crowfoot, at(1, 13));
        store.add_showtime(alien, chinook, at(3, 21));

        let card = store.add_payment("Demo User", "4111111111111111", today + chrono::Duration::days(700));
        if let Ok(hash) = bcrypt::hash("demo", DEMO_HASH_COST) {
            store.add_user("demo@example.com", &hash, "1 Main St", today, Some(card.id));
        }
        store.add_coupon("WELCOME5", 5.0, today + chrono::Duration::days(365));
        store
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add_movie(&self, title: &str, rating: f64) -> MovieId {
        let mut t = self.tables();
        let id = t.next_id();
        t.movies.push(Movie { id, title: title.to_string(), rating });
        id
    }

    pub fn add_theatre(&self, name: &str) -> TheatreId {
        let mut t = self.tables();
        let id = t.next_id();
        t.theatres.push(Theatre { id, name: name.to_string() });
        id
    }

    pub fn add_showtime(&self, movie_id: MovieId, theatre_id: TheatreId, starts_at: NaiveDateTime) -> ShowtimeId {
        let id = self.tables().next_id();
        self.add_showtime_with_id(id, movie_id, theatre_id, starts_at)
    }

    pub fn add_showtime_with_id(
        &self,
        id: ShowtimeId,
        movie_id: MovieId,
        theatre_id: TheatreId,
        starts_at: NaiveDateTime,
    ) -> ShowtimeId {
        let mut t = self.tables();
        t.next_id = t.next_id.max(id);
        t.showtimes.push(Showtime { id, movie_id, theatre_id, starts_at });
        id
    }

    pub fn add_payment(&self, holder_name: &str, card_number: &str, expiry: NaiveDate) -> Payment {
        let mut t = self.tables();
        let payment = Payment {
            id: t.next_id(),
            holder_name: holder_name.to_string(),
            card_number: card_number.to_string(),
            expiry,
        };
        t.payments.push(payment.clone());
        payment
    }

    pub fn add_user(
        &self,
        email: &str,
        password_hash: &str,
        address: &str,
        last_fee_paid: NaiveDate,
        card_id: Option<i32>,
    ) -> i32 {
        let mut t = self.tables();
        let id = t.next_id();
        let card = card_id.and_then(|cid| t.payments.iter().find(|p| p.id == cid).cloned());
        t.users.push(RegisteredUser {
            id,
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            address: address.to_string(),
            last_fee_paid,
            card,
        });
        id
    }

    pub fn add_coupon(&self, code: &str, amount: f64, expiry: NaiveDate) -> Coupon {
        let mut t = self.tables();
        let coupon = Coupon { id: t.next_id(), code: code.to_string(), amount, expiry };
        t.coupons.push(coupon.clone());
        coupon
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn find_movies(&self) -> BookingResult<Vec<Movie>> {
        let mut movies = self.tables().movies.clone();
        movies.sort_by(|a, b| a.title.cmp(&b.title));
        Ok(movies)
    }

    async fn find_theatres(&self) -> BookingResult<Vec<Theatre>> {
        let mut theatres = self.tables().theatres.clone();
        theatres.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(theatres)
    }

    async fn find_theatres_showing_movie(&self, movie_id: MovieId) -> BookingResult<Vec<TheatreId>> {
        let ids: BTreeSet<TheatreId> = self
            .tables()
            .showtimes
            .iter()
            .filter(|s| s.movie_id == movie_id)
            .map(|s| s.theatre_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn find_movies_at_theatre(&self, theatre_id: TheatreId) -> BookingResult<Vec<MovieId>> {
        let ids: BTreeSet<MovieId> = self
            .tables()
            .showtimes
            .iter()
            .filter(|s| s.theatre_id == theatre_id)
            .map(|s| s.movie_id)
            .collect();
        Ok(ids.into_iter().collect())
    }

    async fn find_movie_id_by_title(&self, title: &str) -> BookingResult<Option<MovieId>> {
        Ok(self.tables().movies.iter().find(|m| m.title == title).map(|m| m.id))
    }

    async fn find_theatre_id_by_name(&self, name: &str) -> BookingResult<Option<TheatreId>> {
        Ok(self.tables().theatres.iter().find(|t| t.name == name).map(|t| t.id))
    }

    async fn find_showtimes(&self, movie_id: MovieId, theatre_id: TheatreId) -> BookingResult<Vec<Showtime>> {
        let mut showtimes: Vec<Showtime> = self
            .tables()
            .showtimes
            .iter()
            .filter(|s| s.movie_id == movie_id && s.theatre_id == theatre_id)
            .cloned()
            .collect();
        showtimes.sort_by_key(|s| s.starts_at);
        Ok(showtimes)
    }

    async fn find_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Option<Showtime>> {
        Ok(self.tables().showtimes.iter().find(|s| s.id == showtime_id).cloned())
    }

    async fn find_showtime_id(
        &self,
        movie_id: MovieId,
        theatre_id: TheatreId,
        starts_at: NaiveDateTime,
    ) -> BookingResult<Option<ShowtimeId>> {
        Ok(self
            .tables()
            .showtimes
            .iter()
            .find(|s| s.movie_id == movie_id && s.theatre_id == theatre_id && s.starts_at == starts_at)
            .map(|s| s.id))
    }

    async fn find_tickets_at_showtime(&self, showtime_id: ShowtimeId) -> BookingResult<Vec<TicketId>> {
        Ok(self
            .tables()
            .tickets
            .iter()
            .filter(|t| t.showtime_id == showtime_id)
            .map(|t| t.id)
            .collect())
    }

    async fn find_occupied_seats(&self, showtime_id: ShowtimeId) -> BookingResult<BTreeSet<SeatPosition>> {
        Ok(self.tables().occupied(showtime_id))
    }

    async fn insert_ticket(&self, ticket: &NewTicket, granularity: BookingGranularity) -> BookingResult<Ticket> {
        let mut t = self.tables();

        if !t.showtimes.iter().any(|s| s.id == ticket.showtime_id) {
            return Err(BookingError::not_found("showtime", ticket.showtime_id));
        }
        let existing = t.tickets.iter().filter(|x| x.showtime_id == ticket.showtime_id).count();
        check_availability(granularity, ticket, existing, &t.occupied(ticket.showtime_id))?;

        let created = Ticket {
            id: t.next_id(),
            showtime_id: ticket.showtime_id,
            price: ticket.price,
            seats: ticket.seats.clone(),
        };
        t.tickets.push(created.clone());
        Ok(created)
    }

    async fn find_user_by_email(&self, email: &str) -> BookingResult<Option<RegisteredUser>> {
        Ok(self.tables().users.iter().find(|u| u.email == email).cloned())
    }

    async fn find_payment(&self, payment_id: i32) -> BookingResult<Option<Payment>> {
        Ok(self.tables().payments.iter().find(|p| p.id == payment_id).cloned())
    }

    async fn find_coupon(&self, code: &str) -> BookingResult<Option<Coupon>> {
        Ok(self.tables().coupons.iter().find(|c| c.code == code).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const RACERS: usize = 32;

    fn evening(hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, 15).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn resolves_names_and_showtimes() {
        let store = MemoryStore::new();
        let dune = store.add_movie("Dune", 8.1);
        let chinook = store.add_theatre("Chinook");
        let crowfoot = store.add_theatre("Crowfoot");
        let late = store.add_showtime(dune, chinook, evening(22));
        let early = store.add_showtime(dune, chinook, evening(19));
        store.add_showtime(dune, crowfoot, evening(20));

        assert_eq!(store.find_movie_id_by_title("Dune").await.unwrap(), Some(dune));
        assert_eq!(store.find_movie_id_by_title("Tenet").await.unwrap(), None);
        assert_eq!(store.find_theatre_id_by_name("Crowfoot").await.unwrap(), Some(crowfoot));
        assert_eq!(store.find_theatres_showing_movie(dune).await.unwrap(), vec![chinook, crowfoot]);
        assert_eq!(store.find_movies_at_theatre(chinook).await.unwrap(), vec![dune]);

        let ids: Vec<_> = store
            .find_showtimes(dune, chinook)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, vec![early, late]);
        assert_eq!(store.find_showtime_id(dune, chinook, evening(22)).await.unwrap(), Some(late));
        assert_eq!(store.find_showtime_id(dune, crowfoot, evening(22)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn occupied_seats_come_from_the_showtimes_tickets() {
        let store = MemoryStore::new();
        let movie = store.add_movie("Dune", 8.1);
        let theatre = store.add_theatre("Chinook");
        let first = store.add_showtime(movie, theatre, evening(19));
        let second = store.add_showtime(movie, theatre, evening(22));

        let ticket = NewTicket::new(first, 20.0).with_seats([SeatPosition::new(1, 1), SeatPosition::new(3, 5)]);
        let created = store.insert_ticket(&ticket, BookingGranularity::PerSeat).await.unwrap();

        assert_eq!(store.find_tickets_at_showtime(first).await.unwrap(), vec![created.id]);
        assert!(store.find_tickets_at_showtime(second).await.unwrap().is_empty());
        assert_eq!(store.find_occupied_seats(first).await.unwrap().len(), 2);
        assert!(store.find_occupied_seats(second).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn demo_data_is_browsable() {
        let store = MemoryStore::with_demo_data();
        assert_eq!(store.find_movies().await.unwrap().len(), 3);
        assert!(store.find_coupon("WELCOME5").await.unwrap().is_some());
        let user = store.find_user_by_email("demo@example.com").await.unwrap().unwrap();
        assert!(user.card.is_some());
    }

    fn store_with_showtime() -> Arc<MemoryStore> {
        let store = MemoryStore::new();
        let movie = store.add_movie("Dune", 8.1);
        let theatre = store.add_theatre("Chinook");
        store.add_showtime_with_id(7, movie, theatre, evening(19));
        Arc::new(store)
    }

    async fn race(store: Arc<MemoryStore>, tickets: Vec<NewTicket>, granularity: BookingGranularity) -> Vec<BookingResult<Ticket>> {
        let handles: Vec<_> = tickets
            .into_iter()
            .map(|ticket| {
                let store = store.clone();
                tokio::spawn(async move { store.insert_ticket(&ticket, granularity).await })
            })
            .collect();

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            results.push(handle.await.unwrap());
        }
        results
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_book_a_showtime_once() {
        let store = store_with_showtime();
        let tickets = (0..RACERS).map(|_| NewTicket::new(7, 12.5)).collect();

        let results = race(store.clone(), tickets, BookingGranularity::PerShowtime).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(BookingError::DuplicateBooking { showtime_id: 7, .. })))
                .count(),
            RACERS - 1
        );
        assert_eq!(store.find_tickets_at_showtime(7).await.unwrap().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_never_share_a_seat() {
        let store = store_with_showtime();
        // Every ticket wants (1, 1) plus a seat of its own
        let tickets = (0..RACERS)
            .map(|i| {
                let own = SeatPosition::new(2 + (i / 10) as i32, 1 + (i % 10) as i32);
                NewTicket::new(7, 10.0).with_seats([SeatPosition::new(1, 1), own])
            })
            .collect();

        let results = race(store.clone(), tickets, BookingGranularity::PerSeat).await;

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        for result in results.iter().filter(|r| r.is_err()) {
            match result {
                Err(BookingError::DuplicateBooking { seats, .. }) => assert_eq!(seats, &vec![SeatPosition::new(1, 1)]),
                other => panic!("expected duplicate booking, got {:?}", other),
            }
        }
        assert_eq!(store.find_occupied_seats(7).await.unwrap().len(), 2);
    }
}
