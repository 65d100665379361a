mod hub_fanout_test;
mod leader_test;
mod orb_test;
mod signaling_test;
mod test_helpers;
