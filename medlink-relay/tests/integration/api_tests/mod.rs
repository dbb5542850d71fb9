mod test_offer_round_trip;
mod test_peer_listing;
