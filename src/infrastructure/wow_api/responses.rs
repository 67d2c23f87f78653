//! Wire shapes of the Battle.net game-data endpoints. Only the fields the
//! pipeline reads are modelled; everything else is ignored.

use serde::Deserialize;

use crate::domain::error::PipelineError;
use crate::domain::models::{Auction, Item, TimeLeft};

#[derive(Debug, Deserialize)]
pub(crate) struct Link {
    pub href: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectedRealmIndexResponse {
    #[serde(default)]
    pub connected_realms: Vec<Link>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ConnectedRealmResponse {
    #[serde(default)]
    pub realms: Vec<RealmResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RealmResponse {
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuctionsResponse {
    #[serde(default)]
    pub auctions: Vec<AuctionResponse>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemRef {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AuctionResponse {
    pub id: i64,
    pub item: ItemRef,
    pub quantity: i64,
    #[serde(default)]
    pub unit_price: i64,
    #[serde(default)]
    pub buyout: i64,
    #[serde(default)]
    pub bid: i64,
    pub time_left: TimeLeft,
}

impl AuctionResponse {
    /// Maps the listing onto `realm_id` and checks it is sellable.
    pub fn into_auction(self, realm_id: i64) -> Result<Auction, PipelineError> {
        let auction = Auction {
            realm_id,
            auction_id: self.id,
            item_id: self.item.id,
            quantity: self.quantity,
            unit_price: self.unit_price,
            buyout: self.buyout,
            bid: self.bid,
            time_left: self.time_left,
        };
        auction.validate()?;
        Ok(auction)
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemClassResponse {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ItemResponse {
    pub id: i64,
    pub name: String,
    pub item_class: ItemClassResponse,
    pub item_subclass: ItemClassResponse,
}

impl From<ItemResponse> for Item {
    fn from(response: ItemResponse) -> Self {
        Item {
            id: response.id,
            name: response.name,
            item_class: response.item_class.name,
            item_class_id: response.item_class.id,
            item_subclass: response.item_subclass.name,
            item_subclass_id: response.item_subclass.id,
        }
    }
}
