//! Domain objects published as platform events.
//!
//! Each event type maps one application record to the custom fields of one
//! platform event. [`Address`] is the reference mapping.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sfbus_streaming::{Message, ReplayId, Subscription, event_channel};

/// Field carrying the publishing system's tag on every event.
pub const SOURCE_FIELD: &str = "Source__c";

/// Platform event type for address requests.
pub const ADDRESS_REQUEST_EVENT: &str = "Address_Request__e";

/// A record that can be published as a platform event.
pub trait DomainEvent: Send + Sync {
    /// Platform event API name, e.g. `Address_Request__e`.
    fn event_type(&self) -> &str;

    /// Build the JSON body for the publish request. `source` is written to
    /// [`SOURCE_FIELD`].
    ///
    /// # Errors
    /// Returns an error if the record cannot be serialized.
    fn to_payload(&self, source: &str) -> serde_json::Result<Value>;

    /// Streaming channel carrying this event type.
    fn channel(&self) -> String {
        event_channel(self.event_type())
    }
}

/// Shipping/contact address held by the application.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Application record id. Not published.
    pub id: Option<String>,
    /// Name on the shipment. Not published.
    pub ship_name: Option<String>,
    pub company: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address1: Option<String>,
    pub address2: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub postal_code: Option<String>,
    pub country: Option<String>,
}

/// Wire shape of `Address_Request__e`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRequest {
    #[serde(rename = "Source__c")]
    pub source: String,
    #[serde(rename = "Company__c")]
    pub company: Option<String>,
    #[serde(rename = "First_Name__c")]
    pub first_name: Option<String>,
    #[serde(rename = "Last_Name__c")]
    pub last_name: Option<String>,
    #[serde(rename = "Email__c")]
    pub email: Option<String>,
    #[serde(rename = "Phone__c")]
    pub phone: Option<String>,
    #[serde(rename = "Address1__c")]
    pub address1: Option<String>,
    #[serde(rename = "Address2__c")]
    pub address2: Option<String>,
    #[serde(rename = "City__c")]
    pub city: Option<String>,
    #[serde(rename = "State__c")]
    pub state: Option<String>,
    #[serde(rename = "Postal_Code__c")]
    pub postal_code: Option<String>,
    #[serde(rename = "Country__c")]
    pub country: Option<String>,
}

impl AddressRequest {
    /// Build the wire record for `address`.
    #[must_use]
    pub fn from_address(address: &Address, source: &str) -> Self {
        Self {
            source: source.to_string(),
            company: address.company.clone(),
            first_name: address.first_name.clone(),
            last_name: address.last_name.clone(),
            email: address.email.clone(),
            phone: address.phone.clone(),
            address1: address.address1.clone(),
            address2: address.address2.clone(),
            city: address.city.clone(),
            state: address.state.clone(),
            postal_code: address.postal_code.clone(),
            country: address.country.clone(),
        }
    }

    /// Decode the payload of a delivered `Address_Request__e`.
    #[must_use]
    pub fn from_message(message: &Message) -> Option<Self> {
        serde_json::from_value(message.payload()?.clone()).ok()
    }

    /// Convert back to an application address.
    #[must_use]
    pub fn into_address(self) -> Address {
        Address {
            id: None,
            ship_name: None,
            company: self.company,
            first_name: self.first_name,
            last_name: self.last_name,
            email: self.email,
            phone: self.phone,
            address1: self.address1,
            address2: self.address2,
            city: self.city,
            state: self.state,
            postal_code: self.postal_code,
            country: self.country,
        }
    }
}

impl DomainEvent for Address {
    fn event_type(&self) -> &str {
        ADDRESS_REQUEST_EVENT
    }

    fn to_payload(&self, source: &str) -> serde_json::Result<Value> {
        serde_json::to_value(AddressRequest::from_address(self, source))
    }
}

/// Subscription to address requests, replaying everything the server still
/// retains on first connect.
pub fn address_subscription(
    handler: impl Fn(&Message) + Send + Sync + 'static,
) -> Subscription {
    Subscription::new(event_channel(ADDRESS_REQUEST_EVENT), handler)
        .replay_from(ReplayId::FromStart)
}

/// Source tag of a delivered event, if present.
#[must_use]
pub fn event_source(message: &Message) -> Option<&str> {
    message.payload()?.get(SOURCE_FIELD)?.as_str()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn address() -> Address {
        Address {
            id: Some("42".into()),
            ship_name: Some("Ada Lovelace".into()),
            company: Some("Analytical Engines".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            phone: Some("+44 20 7946 0000".into()),
            address1: Some("12 St James's Square".into()),
            address2: None,
            city: Some("London".into()),
            state: None,
            postal_code: Some("SW1Y 4LB".into()),
            country: Some("GB".into()),
        }
    }

    #[test]
    fn address_maps_to_custom_fields() {
        let payload = address().to_payload("WMS").unwrap();
        assert_eq!(
            payload,
            json!({
                "Source__c": "WMS",
                "Company__c": "Analytical Engines",
                "First_Name__c": "Ada",
                "Last_Name__c": "Lovelace",
                "Email__c": "ada@example.com",
                "Phone__c": "+44 20 7946 0000",
                "Address1__c": "12 St James's Square",
                "Address2__c": null,
                "City__c": "London",
                "State__c": null,
                "Postal_Code__c": "SW1Y 4LB",
                "Country__c": "GB"
            })
        );
    }

    #[test]
    fn address_event_type_and_channel() {
        let a = address();
        assert_eq!(a.event_type(), "Address_Request__e");
        assert_eq!(a.channel(), "/event/Address_Request__e");
    }

    #[test]
    fn delivered_payload_decodes() {
        let payload = address().to_payload("CRM").unwrap();
        let message = Message::event(
            "/event/Address_Request__e",
            json!({ "payload": payload, "event": { "replayId": 3 } }),
        );

        assert_eq!(event_source(&message), Some("CRM"));
        let decoded = AddressRequest::from_message(&message).unwrap().into_address();
        assert_eq!(decoded.city.as_deref(), Some("London"));
        assert_eq!(decoded.id, None);
    }

    #[test]
    fn address_subscription_replays_from_start() {
        let sub = address_subscription(|_| {});
        assert_eq!(sub.channel(), "/event/Address_Request__e");
        assert_eq!(
            sub.replay(),
            sfbus_streaming::CursorSource::Tracked(ReplayId::FromStart)
        );
    }
}
