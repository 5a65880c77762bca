pub mod movie;
pub mod theatre;
pub mod showtime;
pub mod ticket;
pub mod seat;
pub mod user;
pub mod payment;
pub mod coupon;

pub use movie::{Movie, MovieId};
pub use theatre::{Theatre, TheatreId};
pub use showtime::{Showtime, ShowtimeId, ShowtimeView};
pub use ticket::{NewTicket, Ticket, TicketId};
pub use seat::{SeatPosition, SEAT_COLUMNS, SEAT_ROWS};
pub use user::RegisteredUser;
pub use payment::{Payment, PaymentView};
pub use coupon::Coupon;
