//! Factories for portfolio rows, ticks and order events

use services_common::{
    BasketItem, Holding, InstrumentToken, Order, OrderDetails, OrderType, OrderUpdateEvent,
    Position, PositionDetails, Tick, TransactionType,
};

/// Tick with a price, a percent change and the previous close
#[must_use]
pub fn tick(token: InstrumentToken, last_traded_price: f64, change: f64, close_price: f64) -> Tick {
    Tick {
        instrument_token: token,
        last_traded_price,
        change,
        close_price,
        high_price: last_traded_price.max(close_price),
        low_price: last_traded_price.min(close_price),
        tradable: true,
        ..Tick::default()
    }
}

/// Builds holdings for one trading account
#[derive(Debug, Clone)]
pub struct HoldingFactory {
    user_id: String,
    exchange: String,
}

impl Default for HoldingFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl HoldingFactory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            user_id: "AB1234".to_string(),
            exchange: "NSE".to_string(),
        }
    }

    #[must_use]
    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = user_id.into();
        self
    }

    /// Holding not yet priced by any tick
    #[must_use]
    pub fn build(
        &self,
        token: InstrumentToken,
        symbol: &str,
        quantity: i64,
        average_price: f64,
    ) -> Holding {
        Holding {
            user_id: self.user_id.clone(),
            instrument_token: token,
            trading_symbol: symbol.to_string(),
            exchange: self.exchange.clone(),
            quantity,
            average_price,
            invested_amount: quantity as f64 * average_price,
            ..Holding::default()
        }
    }

    /// Holding already valued at `last_price`
    #[must_use]
    pub fn priced(
        &self,
        token: InstrumentToken,
        symbol: &str,
        quantity: i64,
        average_price: f64,
        last_price: f64,
    ) -> Holding {
        let mut holding = self.build(token, symbol, quantity, average_price);
        holding.last_price = last_price;
        holding.current_value = quantity as f64 * last_price;
        holding.net_pnl = holding.current_value - holding.invested_amount;
        holding
    }
}

/// NRML position with executed buy and sell legs
#[must_use]
pub fn position(
    token: InstrumentToken,
    symbol: &str,
    buy_quantity: i64,
    buy_price: f64,
    sell_quantity: i64,
    sell_price: f64,
) -> PositionDetails {
    PositionDetails {
        user_id: "AB1234".to_string(),
        instrument_token: Some(token),
        display_name: symbol.to_string(),
        day_pnl: 0.0,
        position: Position {
            trading_symbol: symbol.to_string(),
            exchange: "NFO".to_string(),
            product: "NRML".to_string(),
            net_quantity: buy_quantity - sell_quantity,
            buy_quantity,
            sell_quantity,
            buy_price,
            sell_price,
            buy_value: buy_quantity as f64 * buy_price,
            sell_value: sell_quantity as f64 * sell_price,
            ..Position::default()
        },
    }
}

/// Order row in `status`
#[must_use]
pub fn order(account_id: &str, order_id: &str, status: &str) -> OrderDetails {
    OrderDetails {
        user_id: account_id.to_string(),
        instrument_token: Some(256_265),
        display_name: "NIFTY 50".to_string(),
        order: Order {
            account_id: account_id.to_string(),
            order_id: order_id.to_string(),
            order_variety: "regular".to_string(),
            status: status.to_string(),
            trading_symbol: "NIFTY25JAN24000CE".to_string(),
            exchange: "NFO".to_string(),
            transaction_type: "BUY".to_string(),
            product: "NRML".to_string(),
            quantity: 75,
            price: 120.5,
        },
        ..OrderDetails::default()
    }
}

/// Unpriced limit basket item
#[must_use]
pub fn basket_item(
    token: InstrumentToken,
    symbol: &str,
    quantity: i64,
    transaction_type: TransactionType,
) -> BasketItem {
    BasketItem {
        display_name: symbol.to_string(),
        trading_symbol: symbol.to_string(),
        instrument_token: token,
        segment: "NFO-OPT".to_string(),
        exchange: "NFO".to_string(),
        quantity,
        order_type: OrderType::Limit,
        transaction_type,
        ..BasketItem::default()
    }
}

/// Order-status push
#[must_use]
pub fn order_update(order_id: &str, status: &str) -> OrderUpdateEvent {
    OrderUpdateEvent {
        account_id: "AB1234".to_string(),
        transaction_type: "BUY".to_string(),
        quantity: 75,
        price: 120.5,
        status: status.to_string(),
        order_id: order_id.to_string(),
        tradingsymbol: Some("NIFTY25JAN24000CE".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_position_net_quantity() {
        let short = position(1, "BANKNIFTY FUT", 0, 0.0, 30, 51_000.0);
        assert_eq!(short.position.net_quantity, -30);
        assert_eq!(short.position.sell_value, 1_530_000.0);
    }

    #[test]
    fn test_priced_holding() {
        let h = HoldingFactory::new().priced(1, "INFY", 10, 1500.0, 1600.0);
        assert_eq!(h.current_value, 16_000.0);
        assert_eq!(h.net_pnl, 1_000.0);
    }
}
