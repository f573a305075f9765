pub mod google_calendar_client;
pub mod openai_client;
pub mod retell_client;
