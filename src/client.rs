mod sms_client;

pub use sms_client::{Sms, SmsClient, SmsError, SmsReceipt, SmsSink};
