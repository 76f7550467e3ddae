pub mod pro_mode;
