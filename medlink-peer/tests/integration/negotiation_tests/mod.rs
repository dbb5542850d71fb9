mod test_duplicate_signals;
mod test_early_candidates;
mod test_polling_stops;
mod test_room_negotiation;
