pub mod match_hypothesis_use_case;
