pub mod claim_translator;
pub mod token_issuer;
pub mod token_validator;
