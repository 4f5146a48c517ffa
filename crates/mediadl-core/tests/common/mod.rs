pub mod fake_aria2;
