mod test_send_gating;
