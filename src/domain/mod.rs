pub mod candidate_url;
pub mod extracted_record;
pub mod lead;
pub mod model_output;
pub mod search;
