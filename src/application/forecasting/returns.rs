use crate::domain::errors::ForecastError;
use crate::domain::simulation::ReturnSummary;

/// Converts a price move into the return on a fractional-share position.
/// Values are left unrounded.
pub fn calculate_returns(
    initial_price: f64,
    final_price: f64,
    invested_amount: f64,
) -> Result<ReturnSummary, ForecastError> {
    if initial_price == 0.0 {
        return Err(ForecastError::DivisionByZero {
            context: "initial price is zero".to_string(),
        });
    }
    if invested_amount == 0.0 {
        return Err(ForecastError::DivisionByZero {
            context: "invested amount is zero".to_string(),
        });
    }

    let shares = invested_amount / initial_price;
    let net_return = (final_price - initial_price) * shares;
    let percent_return = net_return / invested_amount * 100.0;

    Ok(ReturnSummary {
        shares,
        net_return,
        percent_return,
    })
}
