pub mod user_iot_account;
