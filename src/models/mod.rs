pub mod cart;
pub mod event;
pub mod order;
pub mod promo;
pub mod ticket;
pub mod user;

pub use cart::{Cart, CartItem};
pub use event::{
    Event, EventDetail, EventFilter, EventStatus, NewEvent, NewReview, NewVenue, Review, Venue,
};
pub use order::{CheckoutDraft, DraftLine, Order, OrderDraft, OrderStatus};
pub use promo::{AppliedPromo, DiscountType, NewPromoCode, PromoCode};
pub use ticket::{NewTicketType, Ticket, TicketLookup, TicketStatus, TicketType, TicketView};
pub use user::{NewSeller, Profile, ProfileUpdate, Seller, UserPreferences};
