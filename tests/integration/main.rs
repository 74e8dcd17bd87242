mod backhaul;
mod export;
mod migrations;
mod saved;
mod scan;
mod worker;
