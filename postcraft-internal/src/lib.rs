pub mod config; // gateway config file
pub mod endpoints; // API endpoints
pub mod error; // error handling
pub mod gateway_util; // utilities for gateway
pub mod generation; // post generation: prompt, upstream call, parsing
pub mod observability; // utilities for observability (logs)
pub mod pro_code; // activation code allow-list
pub mod quota; // per-client daily quota
