pub mod redemption_orchestrator;
pub mod redemption_service;
