pub mod bed;
pub mod doctor;
pub mod hospital;
