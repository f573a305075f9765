pub mod calendar_service;
pub mod contact_extractor;
pub mod dispatch_service;
pub mod eligibility;
pub mod openai_service;
pub mod phone_call_service;
