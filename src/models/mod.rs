pub mod calendar_event;
pub mod contact;
