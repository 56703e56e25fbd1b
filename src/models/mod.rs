pub mod booking;
pub mod event;
pub mod location;
pub mod movie;
pub mod seat;

pub use booking::{Booking, BookingDetails, BookingStatus};
pub use event::{Event, EventView, TimeWindow};
pub use location::Location;
pub use movie::PurchasedMovie;
pub use seat::{Seat, SeatCategory};
