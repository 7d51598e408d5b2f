pub mod pmms_loader;
